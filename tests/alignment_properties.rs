use libtest_mimic::{Arguments, Failed, Trial};
use monotonic_align::alignment::expansion::expand;
use monotonic_align::alignment::search::{path_score, search_extent};
use monotonic_align::{
    AlignerConfig, AlignmentPath, DurationVector, LikelihoodBatch, LikelihoodMatrix,
    MonotonicAlignerBuilder, ValidExtent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SUITE_NAME: &str = "monotonic_alignment_properties";
const DEFAULT_SEED_COUNT: u64 = 64;
const ORACLE_MAX_FRAMES: usize = 9;

fn main() {
    let args = Arguments::from_args();
    let seed_count = std::env::var("MAS_PROPERTY_SEEDS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SEED_COUNT);

    let mut tests = Vec::new();
    for seed in 0..seed_count {
        tests.push(Trial::test(
            format!("{SUITE_NAME}::invariants::seed_{seed}"),
            move || check_invariants(seed).map_err(Failed::from),
        ));
        tests.push(Trial::test(
            format!("{SUITE_NAME}::oracle::seed_{seed}"),
            move || check_against_oracle(seed).map_err(Failed::from),
        ));
        tests.push(Trial::test(
            format!("{SUITE_NAME}::padding::seed_{seed}"),
            move || check_padding(seed).map_err(Failed::from),
        ));
    }
    tests.push(Trial::test(
        format!("{SUITE_NAME}::expansion_matches_search"),
        || check_expansion_matches_search().map_err(Failed::from),
    ));
    tests.push(Trial::test(format!("{SUITE_NAME}::batch_threads"), || {
        check_batch_threads().map_err(Failed::from)
    }));

    libtest_mimic::run(&args, tests).exit();
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> LikelihoodMatrix {
    let data = (0..rows * cols)
        .map(|_| rng.gen_range(-20.0f32..2.0))
        .collect();
    LikelihoodMatrix::new(rows, cols, data).expect("shape matches data")
}

fn units_of(path: &AlignmentPath, y_len: usize) -> Result<Vec<usize>, String> {
    path.assignments()
        .into_iter()
        .take(y_len)
        .enumerate()
        .map(|(j, unit)| unit.ok_or_else(|| format!("frame {j} has no source unit")))
        .collect()
}

fn check_invariants(seed: u64) -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let x_len = rng.gen_range(1..=24);
    let y_len = rng.gen_range(x_len..=x_len * 6);
    let likelihood = random_matrix(&mut rng, x_len, y_len);
    let extent = likelihood.full_extent();

    let path = search_extent(&likelihood, extent).map_err(|e| e.to_string())?;
    path.validate(extent).map_err(|e| e.to_string())?;

    let units = units_of(&path, y_len)?;
    if units.first() != Some(&0) || units.last() != Some(&(x_len - 1)) {
        return Err(format!("path does not span units 0..{x_len}: {units:?}"));
    }
    for pair in units.windows(2) {
        let step = pair[1] as isize - pair[0] as isize;
        if !(0..=1).contains(&step) {
            return Err(format!("illegal step {step} in {units:?}"));
        }
    }

    let durations = path.durations();
    if durations.total() != y_len {
        return Err(format!("durations sum to {}, expected {y_len}", durations.total()));
    }
    if let Some(i) = durations.as_slice().iter().position(|&d| d == 0) {
        return Err(format!("unit {i} received no frames"));
    }
    Ok(())
}

fn brute_force_best(likelihood: &LikelihoodMatrix) -> f64 {
    fn walk(l: &LikelihoodMatrix, i: usize, j: usize, acc: f64, best: &mut f64) {
        let acc = acc + f64::from(l.get(i, j));
        if j + 1 == l.cols() {
            if i + 1 == l.rows() && acc > *best {
                *best = acc;
            }
            return;
        }
        // frames left must still cover the remaining units
        if l.cols() - (j + 1) > l.rows() - 1 - i {
            walk(l, i, j + 1, acc, best);
        }
        if i + 1 < l.rows() {
            walk(l, i + 1, j + 1, acc, best);
        }
    }
    let mut best = f64::NEG_INFINITY;
    walk(likelihood, 0, 0, 0.0, &mut best);
    best
}

fn check_against_oracle(seed: u64) -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(1_000 + seed);
    let x_len = rng.gen_range(1..=5);
    let y_len = rng.gen_range(x_len..=ORACLE_MAX_FRAMES);
    let likelihood = random_matrix(&mut rng, x_len, y_len);

    let path = search_extent(&likelihood, likelihood.full_extent()).map_err(|e| e.to_string())?;
    let score = path_score(&likelihood, &path).map_err(|e| e.to_string())?;
    let best = brute_force_best(&likelihood);
    if (score - best).abs() > 1e-6 {
        return Err(format!(
            "({x_len}, {y_len}): search scored {score}, brute force found {best}"
        ));
    }
    Ok(())
}

fn check_padding(seed: u64) -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(2_000 + seed);
    let rows = rng.gen_range(2..=10);
    let cols = rng.gen_range(rows..=rows * 4);
    let x_len = rng.gen_range(1..=rows);
    let y_len = rng.gen_range(x_len..=cols);
    let padded = random_matrix(&mut rng, rows, cols);

    let inner_rows = (0..x_len)
        .map(|i| padded.row(i)[..y_len].to_vec())
        .collect::<Vec<_>>();
    let inner = LikelihoodMatrix::from_rows(inner_rows).map_err(|e| e.to_string())?;

    let extent = ValidExtent::new(x_len, y_len);
    let path = search_extent(&padded, extent).map_err(|e| e.to_string())?;
    let reference = search_extent(&inner, inner.full_extent()).map_err(|e| e.to_string())?;

    for i in 0..rows {
        for j in 0..cols {
            let expected = if i < x_len && j < y_len {
                reference.get(i, j)
            } else {
                0.0
            };
            if path.get(i, j) != expected {
                return Err(format!(
                    "cell ({i}, {j}) of ({rows}, {cols}) with extent ({x_len}, {y_len}) differs"
                ));
            }
        }
    }
    Ok(())
}

fn check_expansion_matches_search() -> Result<(), String> {
    let durations = DurationVector::new(vec![2, 1, 3]);
    let expanded = expand(&durations).map_err(|e| e.to_string())?;
    let units = units_of(&expanded, 6)?;
    if units != vec![0, 0, 1, 2, 2, 2] {
        return Err(format!("unexpected expansion {units:?}"));
    }
    if expanded.durations() != durations {
        return Err(format!("column sums {:?}", expanded.durations()));
    }

    // A likelihood that peaks on the expanded path is searched back to it.
    let data = (0..3 * 6)
        .map(|k| if expanded.as_slice()[k] == 1.0 { 0.0 } else { -10.0 })
        .collect();
    let likelihood = LikelihoodMatrix::new(3, 6, data).map_err(|e| e.to_string())?;
    let searched =
        search_extent(&likelihood, likelihood.full_extent()).map_err(|e| e.to_string())?;
    if searched != expanded {
        return Err("search did not recover the expanded path".to_string());
    }
    Ok(())
}

fn check_batch_threads() -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(99);
    let (batch_size, rows, cols) = (16, 12, 40);
    let matrices = (0..batch_size)
        .map(|_| random_matrix(&mut rng, rows, cols))
        .collect::<Vec<_>>();
    let batch = LikelihoodBatch::from_matrices(&matrices).map_err(|e| e.to_string())?;
    let x_lengths = (0..batch_size).map(|b| 1 + b % rows).collect::<Vec<_>>();
    let y_lengths = (0..batch_size).map(|b| cols - b).collect::<Vec<_>>();

    let aligner = MonotonicAlignerBuilder::new(AlignerConfig {
        num_threads: 4,
        parallel_threshold_cells: 0,
        ..AlignerConfig::default()
    })
    .build()
    .map_err(|e| e.to_string())?;
    let result = aligner
        .align_batch(&batch, &x_lengths, &y_lengths)
        .map_err(|e| e.to_string())?;

    for (b, item) in result.iter().enumerate() {
        let path = item.as_ref().map_err(|e| format!("element {b}: {e}"))?;
        let extent = ValidExtent::new(x_lengths[b], y_lengths[b]);
        let single = search_extent(&matrices[b], extent).map_err(|e| e.to_string())?;
        if path != &single {
            return Err(format!("element {b} differs from single-element search"));
        }
        if path.durations().total() != y_lengths[b] {
            return Err(format!("element {b} loses frames"));
        }
    }
    Ok(())
}

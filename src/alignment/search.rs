//! Monotonic alignment search (MAS).
//!
//! Finds the maximum-likelihood alignment between `x_len` source units and
//! `y_len` target frames in which every frame belongs to exactly one unit, the
//! assigned unit never decreases and advances by at most one per frame.
//!
//! Scores accumulate in `f64`; cells with fewer frames than units before them
//! hold [`f64::NEG_INFINITY`] and never win a comparison against a finite score.
//! On exact ties the path stays on the current unit.

use std::num::NonZeroUsize;

use crate::error::AlignmentError;
use crate::types::{
    AlignmentPath, BatchAlignment, LikelihoodBatch, LikelihoodMatrix, ValidExtent, ValidityMask,
};


/// Below this many valid cells across a batch, spawning workers costs more than
/// the search itself.
pub const PARALLEL_THRESHOLD_CELLS: usize = 65_536;

const UNREACHABLE: f64 = f64::NEG_INFINITY;

/// How a batch is spread across worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSchedule {
    pub workers: usize,
    pub parallel_threshold_cells: usize,
}

impl BatchSchedule {
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            parallel_threshold_cells: usize::MAX,
        }
    }
}

impl Default for BatchSchedule {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            parallel_threshold_cells: PARALLEL_THRESHOLD_CELLS,
        }
    }
}

/// Searches one element whose valid extent is read from `mask`.
pub fn search(
    likelihood: &LikelihoodMatrix,
    mask: &ValidityMask,
) -> Result<AlignmentPath, AlignmentError> {
    check_mask_shape(mask, likelihood.rows(), likelihood.cols())?;
    let extent = mask.extent()?;
    search_extent(likelihood, extent)
}

/// Searches one element with an explicit valid extent.
pub fn search_extent(
    likelihood: &LikelihoodMatrix,
    extent: ValidExtent,
) -> Result<AlignmentPath, AlignmentError> {
    maximum_path(
        likelihood.as_slice(),
        likelihood.rows(),
        likelihood.cols(),
        extent,
    )
}

/// Core kernel over a row-major `(rows, cols)` buffer.
///
/// Only the top-left `extent` is read; every other output cell stays 0.
pub fn maximum_path(
    values: &[f32],
    rows: usize,
    cols: usize,
    extent: ValidExtent,
) -> Result<AlignmentPath, AlignmentError> {
    if values.len() != rows * cols {
        return Err(AlignmentError::shape_mismatch(
            "maximum path input",
            format!("{} values for ({rows}, {cols})", rows * cols),
            values.len(),
        ));
    }
    extent.check_within(rows, cols)?;

    let ValidExtent { x_len, y_len } = extent;
    if x_len == 0 || y_len == 0 {
        return Err(AlignmentError::invalid_input(format!(
            "cannot align empty sequences (x_len={x_len}, y_len={y_len})"
        )));
    }
    if y_len < x_len {
        return Err(AlignmentError::unreachable(
            x_len,
            y_len,
            "fewer frames than source units",
        ));
    }

    let scores = forward_scores(values, cols, extent)?;
    let terminal = scores[(x_len - 1) * y_len + (y_len - 1)];
    if !terminal.is_finite() {
        return Err(AlignmentError::unreachable(
            x_len,
            y_len,
            "terminal score is not finite",
        ));
    }

    Ok(backtrack(&scores, rows, cols, extent))
}

/// Cumulative score table `Q`, row-major `(x_len, y_len)`.
fn forward_scores(
    values: &[f32],
    stride: usize,
    extent: ValidExtent,
) -> Result<Vec<f64>, AlignmentError> {
    let ValidExtent { x_len, y_len } = extent;
    let mut q = vec![UNREACHABLE; x_len * y_len];

    for i in 0..x_len {
        let row = &values[i * stride..i * stride + y_len];
        let q_row = i * y_len;
        // j < i: not enough frames to have visited units 0..i
        for (j, &value) in row.iter().enumerate().skip(i) {
            if value.is_nan() || value == f32::INFINITY {
                return Err(AlignmentError::invalid_input(format!(
                    "log-likelihood at ({i}, {j}) is {value}"
                )));
            }
            let best = if i == 0 {
                if j == 0 {
                    0.0
                } else {
                    q[j - 1]
                }
            } else {
                let stay = if j > i { q[q_row + j - 1] } else { UNREACHABLE };
                let advance = q[q_row - y_len + j - 1];
                if stay >= advance {
                    stay
                } else {
                    advance
                }
            };
            q[q_row + j] = best + f64::from(value);
        }
    }

    Ok(q)
}

fn backtrack(q: &[f64], rows: usize, cols: usize, extent: ValidExtent) -> AlignmentPath {
    let ValidExtent { x_len, y_len } = extent;
    let mut path = AlignmentPath::zeros(rows, cols);
    let mut i = x_len - 1;

    for j in (0..y_len).rev() {
        path.mark(i, j);
        if i == 0 || j == 0 {
            continue;
        }
        let stay = q[i * y_len + j - 1];
        let advance = q[(i - 1) * y_len + j - 1];
        if j == i || advance > stay {
            i -= 1;
        }
    }
    debug_assert_eq!(i, 0, "backtrack must finish on the first source unit");

    path
}

/// Total log-likelihood collected by `path` over `likelihood`.
pub fn path_score(
    likelihood: &LikelihoodMatrix,
    path: &AlignmentPath,
) -> Result<f64, AlignmentError> {
    if (likelihood.rows(), likelihood.cols()) != (path.rows(), path.cols()) {
        return Err(AlignmentError::shape_mismatch(
            "path score",
            format!("({}, {})", likelihood.rows(), likelihood.cols()),
            format!("({}, {})", path.rows(), path.cols()),
        ));
    }
    let mut score = 0.0f64;
    for i in 0..path.rows() {
        for j in 0..path.cols() {
            if path.is_marked(i, j) {
                score += f64::from(likelihood.get(i, j));
            }
        }
    }
    Ok(score)
}

/// Searches every element of `batch` with its own valid extent.
///
/// Only a length/batch-size mismatch fails the whole call; every other failure is
/// reported on its element.
pub fn search_batch(
    batch: &LikelihoodBatch,
    extents: &[ValidExtent],
    schedule: BatchSchedule,
) -> Result<BatchAlignment, AlignmentError> {
    check_batch_len("batch extents", batch, extents.len())?;
    let cells = extents.iter().map(ValidExtent::cells).sum();
    Ok(search_batch_with(batch.batch_size(), cells, schedule, |b| {
        maximum_path(batch.element(b), batch.rows(), batch.cols(), extents[b])
    }))
}

/// Same as [`search_batch`] with the extent of each element read from its mask.
pub fn search_batch_masked(
    batch: &LikelihoodBatch,
    masks: &[ValidityMask],
    schedule: BatchSchedule,
) -> Result<BatchAlignment, AlignmentError> {
    check_batch_len("batch masks", batch, masks.len())?;
    let cells = batch.batch_size() * batch.rows() * batch.cols();
    Ok(search_batch_with(batch.batch_size(), cells, schedule, |b| {
        maximum_path(
            batch.element(b),
            batch.rows(),
            batch.cols(),
            masked_extent(batch, &masks[b])?,
        )
    }))
}

/// Valid extent of one batch element, after checking its mask covers the batch shape.
pub(crate) fn masked_extent(
    batch: &LikelihoodBatch,
    mask: &ValidityMask,
) -> Result<ValidExtent, AlignmentError> {
    check_mask_shape(mask, batch.rows(), batch.cols())?;
    mask.extent()
}

pub(crate) fn check_batch_len(
    context: &'static str,
    batch: &LikelihoodBatch,
    len: usize,
) -> Result<(), AlignmentError> {
    if len != batch.batch_size() {
        return Err(AlignmentError::shape_mismatch(
            context,
            batch.batch_size(),
            len,
        ));
    }
    Ok(())
}

/// Runs `search_one` for every index in `0..batch_size`, threaded when the batch
/// holds at least `schedule.parallel_threshold_cells` cells.
pub fn search_batch_with<F>(
    batch_size: usize,
    cells: usize,
    schedule: BatchSchedule,
    search_one: F,
) -> BatchAlignment
where
    F: Fn(usize) -> Result<AlignmentPath, AlignmentError> + Sync,
{
    let workers = schedule.workers.min(batch_size).max(1);
    let items = if workers == 1 || cells < schedule.parallel_threshold_cells {
        tracing::debug!(batch_size, cells, "alignment search: sequential");
        (0..batch_size).map(&search_one).collect()
    } else {
        tracing::debug!(batch_size, cells, workers, "alignment search: threaded");
        search_threaded(batch_size, workers, &search_one)
    };

    let alignment = BatchAlignment::new(items);
    for (element, err) in alignment.failures() {
        tracing::debug!(element, error = %err, "alignment search: element failed");
    }
    alignment
}

fn search_threaded<F>(
    batch_size: usize,
    workers: usize,
    search_one: &F,
) -> Vec<Result<AlignmentPath, AlignmentError>>
where
    F: Fn(usize) -> Result<AlignmentPath, AlignmentError> + Sync,
{
    let chunk = batch_size.div_ceil(workers);
    std::thread::scope(|scope| {
        let handles = (0..batch_size)
            .step_by(chunk)
            .map(|start| {
                let end = (start + chunk).min(batch_size);
                let handle =
                    scope.spawn(move || (start..end).map(search_one).collect::<Vec<_>>());
                (start..end, handle)
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .flat_map(|(range, handle)| match handle.join() {
                Ok(items) => items,
                Err(_) => range
                    .map(|_| {
                        Err(AlignmentError::runtime(
                            "alignment worker",
                            "worker thread panicked",
                        ))
                    })
                    .collect(),
            })
            .collect()
    })
}

pub(crate) fn check_mask_shape(
    mask: &ValidityMask,
    rows: usize,
    cols: usize,
) -> Result<(), AlignmentError> {
    if (mask.rows(), mask.cols()) != (rows, cols) {
        return Err(AlignmentError::shape_mismatch(
            "validity mask",
            format!("({rows}, {cols})"),
            format!("({}, {})", mask.rows(), mask.cols()),
        ));
    }
    Ok(())
}

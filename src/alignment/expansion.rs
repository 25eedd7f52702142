//! Closed-form duration expansion used at inference time.
//!
//! Unit `i` owns the frames `[cum[i] - duration[i], cum[i])` where `cum` is the
//! running sum of durations. There is no search and no backward pass.

use crate::error::AlignmentError;
use crate::types::{AlignmentPath, DurationVector};

/// Largest `(rows, cols)` path an expansion will allocate.
pub const MAX_EXPANSION_CELLS: usize = 1 << 28;

/// Turns predicted log-durations into integer frame counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationRounding {
    pub length_scale: f32,
    pub min_duration: usize,
}

impl Default for DurationRounding {
    fn default() -> Self {
        Self {
            length_scale: 1.0,
            min_duration: 1,
        }
    }
}

/// `max(ceil(exp(ld) * length_scale), min_duration)` for the first `x_len` units,
/// 0 for padding units after them.
///
/// Fails when a unit or the whole utterance would need more frames than an
/// expansion can hold.
pub fn durations_from_log(
    log_durations: &[f32],
    x_len: usize,
    rounding: DurationRounding,
) -> Result<DurationVector, AlignmentError> {
    if x_len > log_durations.len() {
        return Err(AlignmentError::shape_mismatch(
            "log durations",
            format!("at least {x_len} values"),
            log_durations.len(),
        ));
    }
    let frames = log_durations
        .iter()
        .enumerate()
        .map(|(i, &ld)| {
            if i >= x_len {
                return Ok(0);
            }
            let frames = (f64::from(ld).exp() * f64::from(rounding.length_scale)).ceil();
            if !frames.is_finite() || frames < 0.0 {
                return Err(AlignmentError::invalid_input(format!(
                    "log duration {ld} of unit {i} does not give a finite frame count"
                )));
            }
            if frames > MAX_EXPANSION_CELLS as f64 {
                return Err(AlignmentError::invalid_input(format!(
                    "log duration {ld} of unit {i} gives {frames} frames, above {MAX_EXPANSION_CELLS}"
                )));
            }
            Ok((frames as usize).max(rounding.min_duration))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let durations = DurationVector::new(frames);
    total_frames(&durations)?;
    Ok(durations)
}

/// Expands `durations` into a `(len, total)` path with no padding.
pub fn expand(durations: &DurationVector) -> Result<AlignmentPath, AlignmentError> {
    expand_into(durations, durations.len(), total_frames(durations)?)
}

/// Expands `durations` into a padded `(rows, cols)` path.
///
/// Frames past `cols` are masked off, so the last units may lose frames when the
/// durations overshoot.
pub fn expand_into(
    durations: &DurationVector,
    rows: usize,
    cols: usize,
) -> Result<AlignmentPath, AlignmentError> {
    if durations.len() > rows {
        return Err(AlignmentError::shape_mismatch(
            "duration expansion rows",
            format!("at most {rows} units"),
            durations.len(),
        ));
    }
    match rows.checked_mul(cols) {
        Some(cells) if cells <= MAX_EXPANSION_CELLS => {}
        _ => {
            return Err(AlignmentError::invalid_input(format!(
                "expansion of ({rows}, {cols}) exceeds {MAX_EXPANSION_CELLS} cells"
            )))
        }
    }
    let mut path = AlignmentPath::zeros(rows, cols);
    fill(&mut path, durations);
    Ok(path)
}

/// Expands a batch to a common `(rows, cols)` shape; `cols` defaults to the
/// longest total duration in the batch.
pub fn expand_batch(
    durations: &[DurationVector],
    rows: usize,
    cols: Option<usize>,
) -> Result<Vec<AlignmentPath>, AlignmentError> {
    let cols = batch_cols(durations, cols)?;
    durations
        .iter()
        .map(|d| expand_into(d, rows, cols))
        .collect()
}

/// Shared frame width of a batch expansion.
pub(crate) fn batch_cols(
    durations: &[DurationVector],
    cols: Option<usize>,
) -> Result<usize, AlignmentError> {
    match cols {
        Some(cols) => Ok(cols),
        None => durations
            .iter()
            .map(total_frames)
            .try_fold(0, |longest, total| total.map(|t| longest.max(t))),
    }
}

/// Total frames of `durations`, rejecting sums that overflow `usize`.
pub(crate) fn total_frames(durations: &DurationVector) -> Result<usize, AlignmentError> {
    durations.checked_total().ok_or_else(|| {
        AlignmentError::invalid_input(format!(
            "durations of {} units overflow the frame count",
            durations.len()
        ))
    })
}

fn fill(path: &mut AlignmentPath, durations: &DurationVector) {
    let cols = path.cols();
    let mut start = 0usize;
    for (i, end) in durations.cumulative().into_iter().enumerate() {
        for j in start.min(cols)..end.min(cols) {
            path.mark(i, j);
        }
        start = end;
    }
}

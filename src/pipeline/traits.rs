use crate::error::AlignmentError;
use crate::types::{AlignmentPath, DurationVector, ValidExtent};

/// Training-time path search over one row-major `(rows, cols)` element.
pub trait PathSearch: Send + Sync {
    fn search(
        &self,
        values: &[f32],
        rows: usize,
        cols: usize,
        extent: ValidExtent,
    ) -> Result<AlignmentPath, AlignmentError>;
}

/// Inference-time construction of a path from known durations.
pub trait DurationExpander: Send + Sync {
    fn expand(
        &self,
        durations: &DurationVector,
        rows: usize,
        cols: usize,
    ) -> Result<AlignmentPath, AlignmentError>;
}

use crate::alignment::expansion::expand_into;
use crate::alignment::search::maximum_path;
use crate::error::AlignmentError;
use crate::pipeline::traits::{DurationExpander, PathSearch};
use crate::types::{AlignmentPath, DurationVector, ValidExtent};

pub struct MonotonicPathSearch;

impl PathSearch for MonotonicPathSearch {
    fn search(
        &self,
        values: &[f32],
        rows: usize,
        cols: usize,
        extent: ValidExtent,
    ) -> Result<AlignmentPath, AlignmentError> {
        maximum_path(values, rows, cols, extent)
    }
}

pub struct ClosedFormExpander;

impl DurationExpander for ClosedFormExpander {
    fn expand(
        &self,
        durations: &DurationVector,
        rows: usize,
        cols: usize,
    ) -> Result<AlignmentPath, AlignmentError> {
        expand_into(durations, rows, cols)
    }
}

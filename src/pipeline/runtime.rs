use crate::alignment::expansion::{batch_cols, durations_from_log, total_frames, DurationRounding};
use crate::alignment::mask::extents_from_lengths;
use crate::alignment::search::{
    check_batch_len, check_mask_shape, masked_extent, search_batch_with, BatchSchedule,
};
use crate::error::AlignmentError;
use crate::pipeline::traits::{DurationExpander, PathSearch};
use crate::types::{
    AlignmentPath, BatchAlignment, DurationVector, LikelihoodBatch, LikelihoodMatrix, ValidExtent,
    ValidityMask,
};

/// Training-time search and inference-time expansion behind one handle.
pub struct MonotonicAligner {
    schedule: BatchSchedule,
    rounding: DurationRounding,
    path_search: Box<dyn PathSearch>,
    expander: Box<dyn DurationExpander>,
}

pub(crate) struct MonotonicAlignerParts {
    pub schedule: BatchSchedule,
    pub rounding: DurationRounding,
    pub path_search: Box<dyn PathSearch>,
    pub expander: Box<dyn DurationExpander>,
}

/// Inference expansion of one element: rounded durations and their path.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub durations: DurationVector,
    pub path: AlignmentPath,
}

impl MonotonicAligner {
    pub(crate) fn from_parts(parts: MonotonicAlignerParts) -> Self {
        Self {
            schedule: parts.schedule,
            rounding: parts.rounding,
            path_search: parts.path_search,
            expander: parts.expander,
        }
    }

    pub fn align(
        &self,
        likelihood: &LikelihoodMatrix,
        extent: ValidExtent,
    ) -> Result<AlignmentPath, AlignmentError> {
        self.path_search.search(
            likelihood.as_slice(),
            likelihood.rows(),
            likelihood.cols(),
            extent,
        )
    }

    pub fn align_masked(
        &self,
        likelihood: &LikelihoodMatrix,
        mask: &ValidityMask,
    ) -> Result<AlignmentPath, AlignmentError> {
        check_mask_shape(mask, likelihood.rows(), likelihood.cols())?;
        self.align(likelihood, mask.extent()?)
    }

    /// Searches every element with lengths `x_lengths[b]`, `y_lengths[b]`.
    pub fn align_batch(
        &self,
        batch: &LikelihoodBatch,
        x_lengths: &[usize],
        y_lengths: &[usize],
    ) -> Result<BatchAlignment, AlignmentError> {
        let extents = extents_from_lengths(x_lengths, y_lengths)?;
        check_batch_len("batch lengths", batch, extents.len())?;
        let cells = extents.iter().map(ValidExtent::cells).sum();
        let alignment = search_batch_with(batch.batch_size(), cells, self.schedule, |b| {
            self.path_search
                .search(batch.element(b), batch.rows(), batch.cols(), extents[b])
        });
        warn_on_failures(&alignment);
        Ok(alignment)
    }

    pub fn align_batch_masked(
        &self,
        batch: &LikelihoodBatch,
        masks: &[ValidityMask],
    ) -> Result<BatchAlignment, AlignmentError> {
        check_batch_len("batch masks", batch, masks.len())?;
        let cells = batch.batch_size() * batch.rows() * batch.cols();
        let alignment = search_batch_with(batch.batch_size(), cells, self.schedule, |b| {
            let extent = masked_extent(batch, &masks[b])?;
            self.path_search
                .search(batch.element(b), batch.rows(), batch.cols(), extent)
        });
        warn_on_failures(&alignment);
        Ok(alignment)
    }

    /// Rounds predicted log-durations of the first `x_len` units and expands them.
    pub fn expand_log_durations(
        &self,
        log_durations: &[f32],
        x_len: usize,
    ) -> Result<Expansion, AlignmentError> {
        let durations = durations_from_log(log_durations, x_len, self.rounding)?;
        let path = self
            .expander
            .expand(&durations, durations.len(), total_frames(&durations)?)?;
        Ok(Expansion { durations, path })
    }

    /// Expands a batch of known durations to a shared `(rows, cols)` shape;
    /// `cols` defaults to the longest total duration.
    pub fn expand_batch(
        &self,
        durations: &[DurationVector],
        rows: usize,
        cols: Option<usize>,
    ) -> Result<Vec<AlignmentPath>, AlignmentError> {
        let cols = batch_cols(durations, cols)?;
        durations
            .iter()
            .map(|d| self.expander.expand(d, rows, cols))
            .collect()
    }
}

fn warn_on_failures(alignment: &BatchAlignment) {
    let failed = alignment.failures().count();
    if failed > 0 {
        tracing::warn!(
            failed,
            batch_size = alignment.len(),
            "monotonic alignment failed for some batch elements"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlignerConfig;
    use crate::pipeline::builder::MonotonicAlignerBuilder;

    fn aligner() -> MonotonicAligner {
        MonotonicAlignerBuilder::new(AlignerConfig {
            num_threads: 2,
            parallel_threshold_cells: 0,
            ..AlignerConfig::default()
        })
        .build()
        .unwrap()
    }

    #[test]
    fn align_batch_uses_per_element_lengths() {
        let data = vec![
            // element 0: (2, 3) valid inside (2, 4)
            0.0, -5.0, -5.0, 9.0, //
            -5.0, 0.0, 0.0, 9.0, //
            // element 1: (1, 4)
            -1.0, -1.0, -1.0, -1.0, //
            9.0, 9.0, 9.0, 9.0,
        ];
        let batch = LikelihoodBatch::new(2, 2, 4, data).unwrap();
        let result = aligner().align_batch(&batch, &[2, 1], &[3, 4]).unwrap();
        let durations = result.durations();
        assert_eq!(durations[0].as_ref().unwrap().as_slice(), &[1, 2]);
        assert_eq!(durations[1].as_ref().unwrap().as_slice(), &[4, 0]);
    }

    #[test]
    fn align_batch_rejects_length_count_mismatch() {
        let batch = LikelihoodBatch::new(2, 1, 1, vec![0.0, 0.0]).unwrap();
        assert!(aligner().align_batch(&batch, &[1], &[1]).is_err());
    }

    #[test]
    fn align_batch_masked_keeps_failures_local() {
        let batch = LikelihoodBatch::new(2, 2, 2, vec![0.0; 8]).unwrap();
        let masks = vec![
            ValidityMask::from_lengths(2, 2, 2, 2).unwrap(),
            ValidityMask::new(2, 2, vec![false, true, true, true]).unwrap(),
        ];
        let result = aligner().align_batch_masked(&batch, &masks).unwrap();
        assert!(result.get(0).unwrap().is_ok());
        assert!(result.get(1).unwrap().is_err());
    }

    #[test]
    fn expand_log_durations_rounds_then_expands() {
        let expansion = aligner()
            .expand_log_durations(&[0.4, -2.0, 1.0, 0.0], 3)
            .unwrap();
        assert_eq!(expansion.durations.as_slice(), &[2, 1, 3, 0]);
        assert_eq!((expansion.path.rows(), expansion.path.cols()), (4, 6));
        let units: Vec<_> = expansion.path.assignments().into_iter().flatten().collect();
        assert_eq!(units, vec![0, 0, 1, 2, 2, 2]);
    }

    #[test]
    fn align_masked_reads_extent() {
        let likelihood = LikelihoodMatrix::new(2, 3, vec![0.0; 6]).unwrap();
        let mask = ValidityMask::from_lengths(2, 3, 1, 2).unwrap();
        let path = aligner().align_masked(&likelihood, &mask).unwrap();
        assert_eq!(path.durations().as_slice(), &[2, 0]);
    }

    #[test]
    fn oversized_log_duration_fails_without_expanding() {
        let err = aligner().expand_log_durations(&[40.0], 1).unwrap_err();
        assert!(matches!(err, AlignmentError::InvalidInput { .. }));
    }

    #[test]
    fn expand_batch_rejects_overflowing_totals() {
        let batch = vec![DurationVector::new(vec![usize::MAX, 1])];
        assert!(aligner().expand_batch(&batch, 2, None).is_err());
    }

    #[test]
    fn align_masked_rejects_mask_of_other_shape() {
        let likelihood = LikelihoodMatrix::new(2, 3, vec![0.0; 6]).unwrap();
        let mask = ValidityMask::from_lengths(2, 2, 1, 2).unwrap();
        let err = aligner().align_masked(&likelihood, &mask).unwrap_err();
        assert!(matches!(err, AlignmentError::ShapeMismatch { .. }));
    }
}

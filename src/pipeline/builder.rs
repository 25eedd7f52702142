use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::pipeline::defaults::{ClosedFormExpander, MonotonicPathSearch};
use crate::pipeline::runtime::{MonotonicAligner, MonotonicAlignerParts};
use crate::pipeline::traits::{DurationExpander, PathSearch};

pub struct MonotonicAlignerBuilder {
    config: AlignerConfig,
    path_search: Option<Box<dyn PathSearch>>,
    expander: Option<Box<dyn DurationExpander>>,
}

impl MonotonicAlignerBuilder {
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            config,
            path_search: None,
            expander: None,
        }
    }

    pub fn with_path_search(mut self, path_search: Box<dyn PathSearch>) -> Self {
        self.path_search = Some(path_search);
        self
    }

    pub fn with_expander(mut self, expander: Box<dyn DurationExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn build(self) -> Result<MonotonicAligner, AlignmentError> {
        self.config.validate()?;
        let schedule = self.config.schedule();

        tracing::info!(
            workers = schedule.workers,
            parallel_threshold_cells = schedule.parallel_threshold_cells,
            min_duration = self.config.min_duration,
            length_scale = self.config.length_scale,
            "monotonic aligner built"
        );

        Ok(MonotonicAligner::from_parts(MonotonicAlignerParts {
            schedule,
            rounding: self.config.rounding(),
            path_search: self
                .path_search
                .unwrap_or_else(|| Box::new(MonotonicPathSearch)),
            expander: self
                .expander
                .unwrap_or_else(|| Box::new(ClosedFormExpander)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{AlignmentPath, LikelihoodMatrix, ValidExtent};

    use super::*;

    struct FirstUnitOnly;

    impl PathSearch for FirstUnitOnly {
        fn search(
            &self,
            _values: &[f32],
            rows: usize,
            cols: usize,
            extent: ValidExtent,
        ) -> Result<AlignmentPath, AlignmentError> {
            let durations = crate::types::DurationVector::new(vec![extent.y_len]);
            crate::alignment::expansion::expand_into(&durations, rows, cols)
        }
    }

    #[test]
    fn build_with_defaults() {
        let aligner = MonotonicAlignerBuilder::new(AlignerConfig::default())
            .build()
            .expect("default config is valid");
        let likelihood = LikelihoodMatrix::new(1, 2, vec![0.0, 0.0]).unwrap();
        let path = aligner.align(&likelihood, likelihood.full_extent()).unwrap();
        assert_eq!(path.durations().as_slice(), &[2]);
    }

    #[test]
    fn build_uses_injected_path_search() {
        let aligner = MonotonicAlignerBuilder::new(AlignerConfig::default())
            .with_path_search(Box::new(FirstUnitOnly))
            .build()
            .unwrap();
        let likelihood = LikelihoodMatrix::new(2, 3, vec![0.0; 6]).unwrap();
        let path = aligner.align(&likelihood, likelihood.full_extent()).unwrap();
        assert_eq!(path.durations().as_slice(), &[3, 0]);
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = AlignerConfig {
            length_scale: 0.0,
            ..AlignerConfig::default()
        };
        assert!(MonotonicAlignerBuilder::new(config).build().is_err());
    }
}

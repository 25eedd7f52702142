use std::path::Path;

use serde::Deserialize;

use crate::alignment::expansion::DurationRounding;
use crate::alignment::search::{BatchSchedule, PARALLEL_THRESHOLD_CELLS};
use crate::error::AlignmentError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Worker threads for batched search; 0 means available parallelism.
    pub num_threads: usize,
    pub parallel_threshold_cells: usize,
    pub min_duration: usize,
    pub length_scale: f32,
}

impl AlignerConfig {
    pub const DEFAULT_MIN_DURATION: usize = 1;
    pub const DEFAULT_LENGTH_SCALE: f32 = 1.0;

    pub fn load(path: &Path) -> Result<Self, AlignmentError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AlignmentError::io("read aligner config", e))?;
        serde_json::from_str(&data).map_err(|e| AlignmentError::json("parse aligner config", e))
    }

    pub(crate) fn validate(&self) -> Result<(), AlignmentError> {
        if !self.length_scale.is_finite() || self.length_scale <= 0.0 {
            return Err(AlignmentError::invalid_input(format!(
                "length_scale must be positive and finite, got {}",
                self.length_scale
            )));
        }
        if self.min_duration == 0 {
            return Err(AlignmentError::invalid_input(
                "min_duration must be at least 1 frame",
            ));
        }
        Ok(())
    }

    pub(crate) fn schedule(&self) -> BatchSchedule {
        let defaults = BatchSchedule::default();
        BatchSchedule {
            workers: if self.num_threads == 0 {
                defaults.workers
            } else {
                self.num_threads
            },
            parallel_threshold_cells: self.parallel_threshold_cells,
        }
    }

    pub(crate) fn rounding(&self) -> DurationRounding {
        DurationRounding {
            length_scale: self.length_scale,
            min_duration: self.min_duration,
        }
    }
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            parallel_threshold_cells: PARALLEL_THRESHOLD_CELLS,
            min_duration: Self::DEFAULT_MIN_DURATION,
            length_scale: Self::DEFAULT_LENGTH_SCALE,
        }
    }
}

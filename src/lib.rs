pub mod alignment;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod tensor;
pub mod types;

pub use alignment::report::{build_report, CaseMode, CaseReport, Meta, Report};
pub use alignment::search::{maximum_path, search, search_batch, BatchSchedule};
pub use config::AlignerConfig;
pub use error::AlignmentError;
pub use pipeline::builder::MonotonicAlignerBuilder;
pub use pipeline::runtime::{Expansion, MonotonicAligner};
pub use pipeline::traits::{DurationExpander, PathSearch};
pub use types::{
    AlignmentPath, BatchAlignment, DurationVector, LikelihoodBatch, LikelihoodMatrix, ValidExtent,
    ValidityMask,
};

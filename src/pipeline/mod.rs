//! The staged test pipeline: capture, external operations, and the driver

pub mod capture;
pub mod executor;
pub mod ops;

pub use executor::{Executor, PipelineOutcome, Stage};
pub use ops::{PipelineOps, ShellOps, StageContext, StageError, StageResult};

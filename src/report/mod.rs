//! Result reporting: payload shapes and delivery to the central server

pub mod reporter;
pub mod types;

pub use reporter::Reporter;
pub use types::{PluginOutcome, Report, ReportStatus};

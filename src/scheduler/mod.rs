//! The scheduler: cycle driver and time-of-day windows

pub mod cycle;
pub mod windows;

pub use cycle::{OperatorConsole, RunOptions, SchedulerLoop, StdinConsole};
pub use windows::TimeWindows;

//! Patchbot - a continuous patch-testing bot
//!
//! Polls a remote tracker for candidate patch tickets, scores them, drives
//! the best one through an apply/build/test pipeline with auxiliary checks,
//! and posts the outcome to a central report server.

pub mod config;
pub mod error;
pub mod machine;
pub mod pipeline;
pub mod plugins;
pub mod report;
pub mod scheduler;
pub mod scoring;
pub mod ticket;
pub mod tracker;
pub mod version;
pub mod workspace;

pub use error::{PatchbotError, Result};

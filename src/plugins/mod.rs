//! Auxiliary check plugins
//!
//! Plugins run between the build and test stages, after the patched tree is
//! known to compile. They inspect the ticket, the pristine and patched
//! trees, and the patch files themselves. A plugin failure is recorded and
//! downgrades an otherwise green run, but never stops the pipeline.

pub mod checks;

use std::path::{Path, PathBuf};

use crate::error::{PatchbotError, Result};
use crate::pipeline::capture::{CaptureSession, StageTimer};
use crate::report::types::PluginOutcome;
use crate::ticket::Ticket;

/// Everything a plugin may look at.
pub struct PluginContext<'a> {
    pub ticket: &'a Ticket,
    /// Pristine tree at the base version
    pub original_dir: &'a Path,
    /// The ticket's working copy with patches applied
    pub patched_dir: &'a Path,
    /// The fetched patch files, in application order
    pub patch_paths: &'a [PathBuf],
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the trees; `Err` means the check failed.
    fn run(&self, ctx: &PluginContext<'_>) -> Result<()>;
}

/// Static registry. Configuration resolves every identifier through here,
/// so an unknown plugin name fails before any cycle starts.
pub fn resolve(name: &str) -> Result<Box<dyn Plugin>> {
    match name {
        "commit_messages" => Ok(Box::new(checks::CommitMessages)),
        "coverage" => Ok(Box::new(checks::Coverage)),
        "trailing_whitespace" => Ok(Box::new(checks::TrailingWhitespace)),
        other => Err(PatchbotError::Plugin(format!("unknown plugin: {other}"))),
    }
}

/// Banner line bracketing a plugin's output in the log.
pub fn boundary(name: &str, end: bool) -> String {
    let bar = "=".repeat(10);
    if end {
        format!("{bar} end {name} {bar}")
    } else {
        format!("{bar} {name} {bar}")
    }
}

/// Run the configured plugins in order, isolating failures per plugin and
/// timing each one.
pub fn run_all(
    names: &[String],
    ctx: &PluginContext<'_>,
    session: &mut CaptureSession,
    timer: &mut StageTimer,
) -> Vec<PluginOutcome> {
    let mut outcomes = Vec::with_capacity(names.len());
    for name in names {
        session.record(&boundary(name, false));
        let passed = match resolve(name) {
            Ok(plugin) => match plugin.run(ctx) {
                Ok(()) => true,
                Err(e) => {
                    session.record(&format!("{name} failed: {e}"));
                    false
                }
            },
            Err(e) => {
                session.record(&e.to_string());
                false
            }
        };
        timer.finish(name, session);
        session.record(&boundary(name, true));
        outcomes.push(PluginOutcome::new(name.clone(), passed));
    }
    outcomes
}

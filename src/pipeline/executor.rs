//! Staged pipeline driver
//!
//! A run moves through apply, build, plugins, and test in strict order,
//! under one wall-clock deadline, with every line of output captured to the
//! ticket log. The final report status is a pure function of the last state
//! reached, so stage failures and the deadline need no special-case
//! reporting paths.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::BotConfig;
use crate::error::Result;
use crate::plugins::{self, PluginContext};
use crate::report::{PluginOutcome, Report, Reporter, ReportStatus};
use crate::ticket::Ticket;
use crate::workspace::TicketDirs;

use super::capture::{CaptureSession, StageTimer};
use super::ops::{PipelineOps, StageContext, StageError};

/// Last pipeline state reached. Stopping short of `Tested` means the next
/// stage failed; `FailedPlugin` is the downgrade applied to a green run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Started,
    Applied,
    Built,
    Tested,
    FailedPlugin,
}

impl Stage {
    pub fn report_status(self) -> ReportStatus {
        match self {
            Stage::Started => ReportStatus::ApplyFailed,
            Stage::Applied => ReportStatus::BuildFailed,
            Stage::Built => ReportStatus::TestsFailed,
            Stage::Tested => ReportStatus::TestsPassed,
            Stage::FailedPlugin => ReportStatus::PluginFailed,
        }
    }
}

/// What one pipeline run produced, ready to be reported.
pub struct PipelineOutcome {
    pub status: ReportStatus,
    pub plugins: Vec<PluginOutcome>,
    pub log: PathBuf,
}

pub struct Executor<'a, O: PipelineOps> {
    ops: &'a O,
    reporter: &'a Reporter,
    conf: &'a BotConfig,
    echo: bool,
}

impl<'a, O: PipelineOps> Executor<'a, O> {
    pub fn new(ops: &'a O, reporter: &'a Reporter, conf: &'a BotConfig, echo: bool) -> Self {
        Self {
            ops,
            reporter,
            conf,
            echo,
        }
    }

    /// Drive one ticket through the pipeline. Always yields an outcome;
    /// stage failures and the deadline are folded into the final status
    /// rather than surfaced as errors.
    pub async fn run(&self, ticket: &Ticket, dirs: &TicketDirs) -> Result<PipelineOutcome> {
        let mut session = CaptureSession::create(&dirs.log, self.echo)?;
        let mut timer = StageTimer::new();

        // Advisory claim so other bots skip this ticket. One attempt only.
        let pending = Report::new(ReportStatus::Pending, ticket, self.conf, vec![]);
        if let Err(e) = self.reporter.report_pending(ticket.id, &pending).await {
            log::warn!("pending claim for ticket {} not delivered: {}", ticket.id, e);
        }

        let deadline = Instant::now() + self.conf.timeout;
        let ctx = StageContext {
            ticket_id: ticket.id,
            workdir: &dirs.workdir,
            parallelism: self.conf.parallelism,
        };

        let mut state = Stage::Started;
        let mut plugin_outcomes: Vec<PluginOutcome> = Vec::new();

        session.record(&format!("applying {} patches", ticket.patches.len()));
        match self.ops.apply(&ctx, remaining(deadline)).await {
            Ok(output) => {
                session.record_output(&output);
                timer.finish("apply", &mut session);
                state = Stage::Applied;
            }
            Err(e) => record_stage_error(&mut session, "apply", &e),
        }

        if state == Stage::Applied {
            session.record("building");
            match self.ops.build(&ctx, remaining(deadline)).await {
                Ok(output) => {
                    session.record_output(&output);
                    timer.finish("build", &mut session);
                    state = Stage::Built;
                }
                Err(e) => record_stage_error(&mut session, "build", &e),
            }
        }

        if state == Stage::Built {
            let patch_paths = dirs.patch_paths(ticket);
            let plugin_ctx = PluginContext {
                ticket,
                original_dir: &dirs.original,
                patched_dir: &dirs.workdir,
                patch_paths: &patch_paths,
            };
            plugin_outcomes =
                plugins::run_all(&self.conf.plugins, &plugin_ctx, &mut session, &mut timer);

            let left = remaining(deadline);
            if left.is_zero() {
                session.record("pipeline deadline reached; tests skipped");
            } else {
                session.record("running tests");
                match self.ops.test(&ctx, left).await {
                    Ok(output) => {
                        session.record_output(&output);
                        timer.finish("tests", &mut session);
                        state = Stage::Tested;
                    }
                    Err(e) => record_stage_error(&mut session, "tests", &e),
                }
            }
        }

        // A stage failure always wins; plugins only downgrade a green run.
        if state == Stage::Tested && plugin_outcomes.iter().any(|p| !p.passed) {
            state = Stage::FailedPlugin;
        }

        let status = state.report_status();
        session.record(&format!("ticket {}: {}", ticket.id, status));
        timer.summarize(&mut session);
        session.finish();

        Ok(PipelineOutcome {
            status,
            plugins: plugin_outcomes,
            log: dirs.log.clone(),
        })
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn record_stage_error(session: &mut CaptureSession, stage: &str, err: &StageError) {
    match err {
        StageError::Failed { output } => {
            session.record_output(output);
            session.record(&format!("{stage} failed"));
        }
        StageError::TimedOut => {
            session.record(&format!("{stage} killed at the pipeline deadline"));
        }
    }
}

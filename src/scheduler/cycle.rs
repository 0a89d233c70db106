//! The polling scheduler loop
//!
//! Each cycle re-reads the config, honors the time-of-day window, picks a
//! candidate (from an explicit queue or by scoring the tracker's open
//! tickets), runs the pipeline, and reports. Tracker trouble costs one
//! cycle, never the process; the only fatal condition is a failing baseline
//! self-test the operator declines to override.

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;

use crate::config::{BotConfig, FileConfig};
use crate::error::{PatchbotError, Result};
use crate::machine::MachineSignature;
use crate::pipeline::{Executor, PipelineOps, PipelineOutcome};
use crate::report::{Report, Reporter, ReportStatus};
use crate::scoring::{self, ScoreResult, ScoredTicket};
use crate::ticket::Ticket;
use crate::tracker::Tracker;
use crate::workspace::Workspace;

/// Chance per empty cycle of sweeping closed tickets' working copies.
const CLEANUP_PROBABILITY: f64 = 0.01;

/// Operator interaction point for the baseline check. Production reads
/// stdin; tests answer programmatically.
pub trait OperatorConsole: Send + Sync {
    /// Returns true if the operator wants to continue anyway.
    fn confirm_continue(&self, prompt: &str) -> bool;
}

pub struct StdinConsole;

impl OperatorConsole for StdinConsole {
    fn confirm_continue(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// What one invocation of the bot should do.
pub struct RunOptions {
    /// Bound on cycles; `None` runs until interrupted
    pub count: Option<usize>,
    /// Explicit ticket ids consumed in order instead of tracker queries
    pub queue: Vec<u64>,
    /// Skip the baseline self-test
    pub skip_base: bool,
}

pub struct SchedulerLoop<'a, T: Tracker, O: PipelineOps> {
    tracker: &'a T,
    ops: &'a O,
    workspace: &'a Workspace,
    console: &'a dyn OperatorConsole,
    config_path: Option<PathBuf>,
    server: String,
    echo: bool,
}

impl<'a, T: Tracker, O: PipelineOps> SchedulerLoop<'a, T, O> {
    pub fn new(
        tracker: &'a T,
        ops: &'a O,
        workspace: &'a Workspace,
        console: &'a dyn OperatorConsole,
        config_path: Option<PathBuf>,
        server: impl Into<String>,
        echo: bool,
    ) -> Self {
        Self {
            tracker,
            ops,
            workspace,
            console,
            config_path,
            server: server.into(),
            echo,
        }
    }

    pub async fn run(&self, opts: RunOptions) -> Result<()> {
        if !opts.skip_base {
            self.verify_baseline().await?;
        }

        let mut queue: VecDeque<u64> = opts.queue.iter().copied().collect();
        let budget = cycle_budget(opts.count, queue.len());

        for _ in 0..budget {
            if let Err(e) = self.cycle(&mut queue).await {
                log::warn!("cycle failed: {}", e);
                tokio::time::sleep(self.recovery_pause()).await;
            }
        }
        Ok(())
    }

    /// Score everything testable, ascending, for the diagnostic listing.
    pub async fn list_candidates(&self) -> Result<Vec<ScoredTicket>> {
        let conf = self.snapshot().await?;
        let tickets = self.tracker.open_tickets(Some(&conf.trusted_authors)).await?;
        Ok(scoring::rank_all(scoring::score_all(tickets, &conf)))
    }

    async fn cycle(&self, queue: &mut VecDeque<u64>) -> Result<()> {
        let conf = self.snapshot().await?;

        // Window first, so an out-of-window cycle leaves the queue alone and
        // never contacts the tracker.
        if !conf.windows.is_open_now() {
            log::info!("outside the testing window; idle");
            tokio::time::sleep(conf.idle).await;
            return Ok(());
        }

        let chosen: Option<(Ticket, Option<ScoreResult>)> = match queue.pop_front() {
            Some(id) => Some((self.tracker.lookup(id).await?, None)),
            None => self
                .pick_candidate(&conf)
                .await?
                .map(|scored| (scored.ticket, Some(scored.score))),
        };

        let (ticket, score) = match chosen {
            Some(pair) => pair,
            None => {
                log::info!("no testable tickets");
                self.maybe_cleanup().await;
                tokio::time::sleep(conf.idle).await;
                return Ok(());
            }
        };

        self.run_ticket(&ticket, score.as_ref(), &conf).await;
        Ok(())
    }

    async fn snapshot(&self) -> Result<BotConfig> {
        let file = FileConfig::load(self.config_path.as_ref())?;
        let base = match &file.base {
            Some(base) => base.clone(),
            None => self.workspace.base_version()?,
        };
        let trusted = match &file.trusted_authors {
            Some(authors) => authors.clone(),
            None => self.tracker.trusted_authors().await?,
        };
        BotConfig::resolve(file, base, trusted)
    }

    async fn pick_candidate(&self, conf: &BotConfig) -> Result<Option<ScoredTicket>> {
        let tickets = self.tracker.open_tickets(Some(&conf.trusted_authors)).await?;
        Ok(scoring::select_best(scoring::score_all(tickets, conf)))
    }

    /// Run the pipeline and report for one ticket. Infrastructure trouble is
    /// logged and yields `None`; it never stops the loop.
    async fn run_ticket(
        &self,
        ticket: &Ticket,
        score: Option<&ScoreResult>,
        conf: &BotConfig,
    ) -> Option<ReportStatus> {
        if self.echo {
            print_banner(ticket, score);
        }
        log::info!("testing ticket {} ({})", ticket.id, ticket.title);

        let reporter = match Reporter::new(&self.server, conf.idle) {
            Ok(reporter) => reporter,
            Err(e) => {
                log::warn!("cannot set up reporting: {}", e);
                return None;
            }
        };

        let dirs = match self.workspace.prepare(ticket.id) {
            Ok(dirs) => dirs,
            Err(e) => {
                log::warn!("cannot prepare working copy for ticket {}: {}", ticket.id, e);
                return None;
            }
        };

        let executor = Executor::new(self.ops, &reporter, conf, self.echo);
        let outcome = match executor.run(ticket, &dirs).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("pipeline for ticket {} broke down: {}", ticket.id, e);
                return None;
            }
        };

        let PipelineOutcome { status, plugins, log } = outcome;
        let report = Report::new(status, ticket, conf, plugins);
        if let Err(e) = reporter.report(ticket.id, &report, Some(&log)).await {
            log::warn!("report for ticket {} abandoned: {}", ticket.id, e);
        }
        Some(status)
    }

    /// Test the clean baseline (ticket 0) unless a passing report from an
    /// equivalent machine already exists. A failing baseline needs explicit
    /// operator confirmation before the loop may start.
    async fn verify_baseline(&self) -> Result<()> {
        let conf = self.snapshot().await?;
        let clean = self.tracker.lookup(0).await?;

        let verified = clean.current_reports(&conf.base).iter().any(|report| {
            report.status == ReportStatus::TestsPassed.as_str()
                && MachineSignature::from_value(&report.machine)
                    .map(|m| m.matches_prefix(&conf.machine, conf.machine_match))
                    .unwrap_or(false)
        });
        if verified {
            log::info!("baseline already verified for base {}", conf.base);
            return Ok(());
        }

        log::info!("running baseline self-test");
        let status = self.run_ticket(&clean, None, &conf).await;
        if status == Some(ReportStatus::TestsPassed) {
            return Ok(());
        }

        let shown = match status {
            Some(status) => status.to_string(),
            None => "no result".to_string(),
        };
        let prompt = format!("Failing tests in your install: {shown}. Continue anyway?");
        if self.console.confirm_continue(&prompt) {
            log::warn!("continuing despite failing baseline");
            Ok(())
        } else {
            Err(PatchbotError::Pipeline(format!(
                "baseline self-test failed: {shown}"
            )))
        }
    }

    async fn maybe_cleanup(&self) {
        if rand::random::<f64>() >= CLEANUP_PROBABILITY {
            return;
        }
        log::info!("looking up closed tickets for cleanup");
        let closed = match self.tracker.closed_tickets().await {
            Ok(closed) => closed,
            Err(e) => {
                log::warn!("closed ticket lookup failed: {}", e);
                return;
            }
        };
        match self.workspace.cleanup_closed(&closed) {
            Ok(removed) if !removed.is_empty() => {
                log::info!("removed {} closed working copies", removed.len());
            }
            Ok(_) => {}
            Err(e) => log::warn!("cleanup failed: {}", e),
        }
    }

    /// Pause after a failed cycle. Honors the configured idle interval when
    /// the config is still readable.
    fn recovery_pause(&self) -> Duration {
        let idle = FileConfig::load(self.config_path.as_ref())
            .map(|file| file.idle)
            .unwrap_or_else(|_| FileConfig::default().idle);
        Duration::from_secs(idle)
    }
}

fn cycle_budget(count: Option<usize>, queue_len: usize) -> usize {
    match count {
        Some(n) => n,
        None if queue_len > 0 => queue_len,
        None => usize::MAX,
    }
}

fn print_banner(ticket: &Ticket, score: Option<&ScoreResult>) {
    let bar = "=".repeat(30);
    println!("\n\n{} {} {}", bar, ticket.id.to_string().bold(), bar);
    println!("{}", ticket.title);
    match score {
        Some(score) => println!("score {score}"),
        None => println!("score none (explicitly queued)"),
    }
    println!();
}

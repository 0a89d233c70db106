//! Report payloads posted to the central server

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BotConfig;
use crate::machine::MachineSignature;
use crate::ticket::{Dependency, Ticket};

/// Outcome of one pipeline run. `Pending` is the provisional claim posted
/// before work starts; the rest name the first stage that failed, or full
/// success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Pending,
    ApplyFailed,
    BuildFailed,
    TestsFailed,
    TestsPassed,
    PluginFailed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::ApplyFailed => "ApplyFailed",
            ReportStatus::BuildFailed => "BuildFailed",
            ReportStatus::TestsFailed => "TestsFailed",
            ReportStatus::TestsPassed => "TestsPassed",
            ReportStatus::PluginFailed => "PluginFailed",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReportStatus::Pending)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pass/fail for one auxiliary plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOutcome {
    pub name: String,
    pub passed: bool,
}

impl PluginOutcome {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }
}

/// One run's report. Built in full once the outcome is known and treated as
/// immutable from then on; the server keeps the authoritative history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    pub patches: Vec<String>,
    pub deps: Vec<Dependency>,
    pub spkgs: Vec<String>,
    pub base: String,
    pub user: String,
    pub machine: MachineSignature,
    pub time: DateTime<Utc>,
    pub plugins: Vec<PluginOutcome>,
}

impl Report {
    pub fn new(
        status: ReportStatus,
        ticket: &Ticket,
        conf: &BotConfig,
        plugins: Vec<PluginOutcome>,
    ) -> Self {
        Self {
            status,
            patches: ticket.patches.clone(),
            deps: ticket.depends_on.clone(),
            spkgs: ticket.spkgs.clone(),
            base: conf.base.clone(),
            user: conf.user.clone(),
            machine: conf.machine.clone(),
            time: Utc::now(),
            plugins,
        }
    }
}

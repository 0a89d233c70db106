//! Bot configuration
//!
//! The config file is re-read at the top of every scheduler cycle and
//! resolved into an immutable [`BotConfig`] snapshot, so edits take effect
//! on the next cycle without a restart and a running pipeline never sees a
//! half-updated view.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PatchbotError, Result};
use crate::machine::MachineSignature;
use crate::plugins;
use crate::scheduler::windows::TimeWindows;

/// Raw config file contents. Every field is optional or defaulted; the
/// resolved snapshot fills the gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Rating bonuses keyed by author, participant, component, status,
    /// priority, or literal ticket id
    pub bonus: HashMap<String, i64>,

    /// Authors whose patches may be run; fetched from the server when unset
    pub trusted_authors: Option<Vec<String>>,

    /// Override the detected machine signature
    pub machine: Option<Vec<String>>,

    /// How many leading signature elements make two machines equivalent
    pub machine_match: usize,

    /// Reported user name; falls back to $USER
    pub user: Option<String>,

    /// Override the base version read from the workspace VERSION file
    pub base: Option<String>,

    /// Seconds to sleep when idle, and between report retries
    pub idle: u64,

    /// Hour windows in which the bot may test, e.g. "22-2,12-14"
    pub time_of_day: String,

    /// Build parallelism handed to the stage commands
    pub parallelism: u32,

    /// Wall-clock bound in seconds for one whole pipeline run
    pub timeout: u64,

    /// Plugin identifiers, run in order between build and test
    pub plugins: Vec<String>,

    pub commands: CommandsConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            bonus: HashMap::new(),
            trusted_authors: None,
            machine: None,
            machine_match: 3,
            user: None,
            base: None,
            idle: 300,
            time_of_day: "0-0".to_string(),
            parallelism: 3,
            timeout: 3 * 60 * 60,
            plugins: default_plugins(),
            commands: CommandsConfig::default(),
        }
    }
}

fn default_plugins() -> Vec<String> {
    vec![
        "commit_messages".to_string(),
        "coverage".to_string(),
        "trailing_whitespace".to_string(),
    ]
}

/// Shell command templates for the opaque pipeline stages. `{ticket}`,
/// `{workdir}`, and `{parallelism}` are substituted before running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub apply: String,
    pub build: String,
    pub test: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            apply: "./scripts/apply-ticket {ticket}".to_string(),
            build: "make -j{parallelism}".to_string(),
            test: "make check".to_string(),
        }
    }
}

const DEFAULT_BONUS: [(&str, i64); 4] = [
    ("needs_review", 1000),
    ("positive_review", 500),
    ("blocker", 100),
    ("critical", 50),
];

impl FileConfig {
    /// Load configuration with fallback chain: explicit path, then
    /// `~/.config/patchbot/patchbot.yml`, then `./patchbot.yml`, then
    /// built-in defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary = config_dir.join(project_name).join(format!("{project_name}.yml"));
            if primary.exists() {
                match Self::load_from_file(&primary) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary.display(), e);
                    }
                }
            }
        }

        let fallback = PathBuf::from(format!("{project_name}.yml"));
        if fallback.exists() {
            match Self::load_from_file(&fallback) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            PatchbotError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            PatchbotError::Config(format!("cannot parse {}: {}", path.as_ref().display(), e))
        })?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Immutable, fully resolved configuration for one scheduler cycle.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bonus: HashMap<String, i64>,
    pub trusted_authors: Vec<String>,
    pub machine: MachineSignature,
    pub machine_match: usize,
    pub user: String,
    pub base: String,
    pub idle: Duration,
    pub windows: TimeWindows,
    pub parallelism: u32,
    pub timeout: Duration,
    pub plugins: Vec<String>,
    pub commands: CommandsConfig,
}

impl BotConfig {
    /// Resolve a raw file config into a snapshot. `base` and `trusted`
    /// are the caller's fallbacks (workspace VERSION file, server trusted
    /// list); file values win when present. Unknown plugin identifiers and
    /// unparsable windows fail here, before any cycle work starts.
    pub fn resolve(file: FileConfig, base: String, trusted: Vec<String>) -> Result<Self> {
        let mut bonus = file.bonus;
        for (key, value) in DEFAULT_BONUS {
            bonus.entry(key.to_string()).or_insert(value);
        }

        for name in &file.plugins {
            plugins::resolve(name)?;
        }

        let windows = TimeWindows::parse(&file.time_of_day)?;

        let machine = match file.machine {
            Some(parts) => MachineSignature::new(parts),
            None => MachineSignature::detect(),
        };

        let user = file
            .user
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            bonus,
            trusted_authors: file.trusted_authors.unwrap_or(trusted),
            machine,
            machine_match: file.machine_match,
            user,
            base: file.base.unwrap_or(base),
            idle: Duration::from_secs(file.idle),
            windows,
            parallelism: file.parallelism,
            timeout: Duration::from_secs(file.timeout),
            plugins: file.plugins,
            commands: file.commands,
        })
    }

    pub fn bonus_for(&self, key: &str) -> i64 {
        self.bonus.get(key).copied().unwrap_or(0)
    }

    pub fn is_trusted(&self, author: &str) -> bool {
        self.trusted_authors.iter().any(|a| a == author)
    }
}

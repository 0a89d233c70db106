//! On-disk workspace layout
//!
//! One workspace root per bot, holding `tickets/<id>/` working copies,
//! `logs/<id>.log` run logs, and a `VERSION` file naming the base version
//! under test. The ticket-0 directory is the pristine baseline tree and is
//! never cleaned up.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{PatchbotError, Result};
use crate::ticket::Ticket;

pub struct Workspace {
    root: PathBuf,
}

/// Directory layout for one pipeline run.
pub struct TicketDirs {
    /// The ticket's working copy; stage commands run here
    pub workdir: PathBuf,
    /// Pristine baseline tree (the ticket-0 working copy)
    pub original: PathBuf,
    /// Log file for this run
    pub log: PathBuf,
}

impl TicketDirs {
    /// Paths of the fetched patch files the apply tool left under
    /// `patches/`, in the ticket's application order. Names without a
    /// fetched file are skipped.
    pub fn patch_paths(&self, ticket: &Ticket) -> Vec<PathBuf> {
        let dir = self.workdir.join("patches");
        ticket
            .patches
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.exists())
            .collect()
    }
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ticket_dir(&self, id: u64) -> PathBuf {
        self.root.join("tickets").join(id.to_string())
    }

    pub fn log_path(&self, id: u64) -> PathBuf {
        self.root.join("logs").join(format!("{id}.log"))
    }

    /// The base version under test, read from the workspace `VERSION` file.
    /// The config file's `base` key overrides this when set.
    pub fn base_version(&self) -> Result<String> {
        let path = self.root.join("VERSION");
        let text = std::fs::read_to_string(&path).map_err(|e| {
            PatchbotError::Workspace(format!("cannot read {}: {e}", path.display()))
        })?;
        let version = text.trim();
        if version.is_empty() {
            return Err(PatchbotError::Workspace(format!(
                "{} names no version",
                path.display()
            )));
        }
        Ok(version.to_string())
    }

    /// Create the working copy directory for a ticket and hand back the
    /// layout for its run.
    pub fn prepare(&self, id: u64) -> Result<TicketDirs> {
        let workdir = self.ticket_dir(id);
        std::fs::create_dir_all(&workdir)?;
        Ok(TicketDirs {
            workdir,
            original: self.ticket_dir(0),
            log: self.log_path(id),
        })
    }

    /// Delete working copies belonging to closed tickets. Returns the ids
    /// actually removed, sorted.
    pub fn cleanup_closed(&self, closed: &HashSet<u64>) -> Result<Vec<u64>> {
        let tickets = self.root.join("tickets");
        if !tickets.is_dir() {
            return Ok(Vec::new());
        }
        let mut removed = Vec::new();
        for entry in std::fs::read_dir(&tickets)? {
            let entry = entry?;
            let name = entry.file_name();
            let id = match name.to_str().and_then(|s| s.parse::<u64>().ok()) {
                Some(id) => id,
                None => continue,
            };
            if id != 0 && closed.contains(&id) {
                log::info!("deleting closed ticket working copy {}", entry.path().display());
                std::fs::remove_dir_all(entry.path())?;
                removed.push(id);
            }
        }
        removed.sort_unstable();
        Ok(removed)
    }
}

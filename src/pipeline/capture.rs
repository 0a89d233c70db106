//! Per-ticket log capture
//!
//! Everything a pipeline run prints goes through a [`CaptureSession`]: an
//! owned handle on the ticket's log file that also echoes to the console.
//! Because it is a plain owned value, every exit path out of the executor
//! releases the file, and the log on disk is complete up to the moment a
//! stage failed or timed out.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;

use crate::error::Result;

pub struct CaptureSession {
    file: File,
    path: PathBuf,
    echo: bool,
    started: Instant,
}

impl CaptureSession {
    /// Open a fresh log at `path`, creating parent directories and writing
    /// the opening timestamp line.
    pub fn create(path: &Path, echo: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut session = Self {
            file,
            path: path.to_path_buf(),
            echo,
            started: Instant::now(),
        };
        session.record(&format!("Started: {}", Local::now().format("%Y-%m-%d %H:%M:%S")));
        Ok(session)
    }

    /// Append one line to the log, echoing to stdout when enabled. Log IO
    /// failures are warned about, never fatal; losing a log line must not
    /// fail the pipeline.
    pub fn record(&mut self, line: &str) {
        if self.echo {
            println!("{line}");
        }
        if let Err(e) = writeln!(self.file, "{line}") {
            log::warn!("log write failed for {}: {}", self.path.display(), e);
        }
    }

    /// Append captured multi-line command output.
    pub fn record_output(&mut self, text: &str) {
        for line in text.lines() {
            self.record(line);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the closing elapsed line and flush.
    pub fn finish(mut self) {
        let secs = self.started.elapsed().as_secs();
        self.record(&format!(
            "Finished: {} ({} seconds total)",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            secs
        ));
        if let Err(e) = self.file.flush() {
            log::warn!("log flush failed for {}: {}", self.path.display(), e);
        }
    }
}

/// Wall-clock bookkeeping for pipeline stages. Each `finish` logs the time
/// since the previous mark and remembers it for the closing summary.
#[derive(Default)]
pub struct StageTimer {
    last: Option<Instant>,
    history: Vec<(String, u64)>,
}

impl StageTimer {
    pub fn new() -> Self {
        Self {
            last: Some(Instant::now()),
            history: Vec::new(),
        }
    }

    pub fn finish(&mut self, label: &str, session: &mut CaptureSession) {
        let now = Instant::now();
        let secs = self
            .last
            .map(|t| now.duration_since(t).as_secs())
            .unwrap_or(0);
        self.history.push((label.to_string(), secs));
        session.record(&format!("{label} -- {secs} seconds"));
        self.last = Some(now);
    }

    pub fn summarize(&self, session: &mut CaptureSession) {
        for (label, secs) in &self.history {
            session.record(&format!("{label} -- {secs} seconds"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_writes_lines_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("42.log");
        let mut session = CaptureSession::create(&path, false).unwrap();
        session.record("applying patch one");
        session.record_output("line a\nline b");
        session.finish();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Started: "));
        assert!(text.contains("applying patch one"));
        assert!(text.contains("line a"));
        assert!(text.contains("line b"));
        assert!(text.contains("seconds total"));
    }

    #[test]
    fn test_session_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("x.log");
        let session = CaptureSession::create(&path, false).unwrap();
        assert!(path.exists());
        session.finish();
    }

    #[test]
    fn test_timer_history_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.log");
        let mut session = CaptureSession::create(&path, false).unwrap();

        let mut timer = StageTimer::new();
        timer.finish("apply", &mut session);
        timer.finish("build", &mut session);
        timer.summarize(&mut session);
        session.finish();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("apply -- ").count(), 2);
        assert_eq!(text.matches("build -- ").count(), 2);
    }
}

//! Builtin plugins
//!
//! Three checks ship with the bot: patches must carry commit messages, must
//! not introduce trailing whitespace, and must not reduce the test-marker
//! count of any file they touch.

use std::path::{Path, PathBuf};

use crate::error::{PatchbotError, Result};

use super::{Plugin, PluginContext};

/// Every patch file must carry a non-empty commit message.
pub struct CommitMessages;

impl Plugin for CommitMessages {
    fn name(&self) -> &'static str {
        "commit_messages"
    }

    fn run(&self, ctx: &PluginContext<'_>) -> Result<()> {
        let mut missing = Vec::new();
        for path in ctx.patch_paths {
            let text = read_patch(path)?;
            match commit_message_of(&text) {
                Some(subject) => log::debug!("{}: {}", path.display(), subject),
                None => missing.push(file_name(path)),
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PatchbotError::Plugin(format!(
                "patches without a commit message: {}",
                missing.join(", ")
            )))
        }
    }
}

/// No added line may end in whitespace.
pub struct TrailingWhitespace;

impl Plugin for TrailingWhitespace {
    fn name(&self) -> &'static str {
        "trailing_whitespace"
    }

    fn run(&self, ctx: &PluginContext<'_>) -> Result<()> {
        let mut violations = Vec::new();
        for path in ctx.patch_paths {
            let text = read_patch(path)?;
            for (lineno, line) in text.lines().enumerate() {
                if line.starts_with("+++") {
                    continue;
                }
                if let Some(added) = line.strip_prefix('+') {
                    if added.len() != added.trim_end().len() {
                        violations.push(format!("{}:{}", file_name(path), lineno + 1));
                    }
                }
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PatchbotError::Plugin(format!(
                "trailing whitespace introduced at {}",
                violations.join(", ")
            )))
        }
    }
}

/// Files touched by a patch must keep at least as many test markers in the
/// patched tree as in the original tree.
pub struct Coverage;

const TEST_MARKERS: &[&str] = &["#[test]", "def test_", "TESTS:", "EXAMPLES:"];

impl Plugin for Coverage {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn run(&self, ctx: &PluginContext<'_>) -> Result<()> {
        let mut regressions = Vec::new();
        for path in ctx.patch_paths {
            let text = read_patch(path)?;
            for rel in touched_files(&text) {
                let before = marker_count(&ctx.original_dir.join(&rel));
                let after = marker_count(&ctx.patched_dir.join(&rel));
                if after < before {
                    regressions.push(format!("{} ({before} -> {after})", rel.display()));
                }
            }
        }
        if regressions.is_empty() {
            Ok(())
        } else {
            Err(PatchbotError::Plugin(format!(
                "test coverage dropped in {}",
                regressions.join(", ")
            )))
        }
    }
}

fn read_patch(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| PatchbotError::Plugin(format!("cannot read {}: {e}", path.display())))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Find the commit message in a patch file: a `Subject:` line, or the first
/// body line before the diff begins. Export-style header lines do not count
/// as a message.
fn commit_message_of(text: &str) -> Option<&str> {
    for line in text.lines() {
        let t = line.trim();
        if t.starts_with("diff ")
            || t.starts_with("--- ")
            || t.starts_with("+++ ")
            || t.starts_with("@@")
            || t.starts_with("Index: ")
        {
            return None;
        }
        if t.is_empty() {
            continue;
        }
        if let Some(subject) = t.strip_prefix("Subject:") {
            let subject = subject.trim().trim_start_matches("[PATCH]").trim();
            if subject.is_empty() {
                continue;
            }
            return Some(subject);
        }
        if t.starts_with('#')
            || t.starts_with("From")
            || t.starts_with("Date:")
            || t.starts_with("MIME-")
            || t.starts_with("Content-")
        {
            continue;
        }
        return Some(t);
    }
    None
}

/// Paths named on `+++ ` lines, minus the `b/` prefix and deletions.
fn touched_files(patch_text: &str) -> Vec<PathBuf> {
    patch_text
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("+++ ")?;
            let path = rest.split('\t').next().unwrap_or(rest).trim();
            if path == "/dev/null" {
                return None;
            }
            Some(PathBuf::from(path.strip_prefix("b/").unwrap_or(path)))
        })
        .collect()
}

fn marker_count(path: &Path) -> usize {
    match std::fs::read_to_string(path) {
        Ok(text) => TEST_MARKERS.iter().map(|m| text.matches(m).count()).sum(),
        Err(_) => 0,
    }
}

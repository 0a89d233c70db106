//! Machine signatures and redundancy comparison
//!
//! Every report carries a signature describing the host that produced it.
//! Two hosts count as equivalent when their signatures agree on a configured
//! prefix; the redundancy vector records where a prior report's host differs
//! from this one, and drives the "someone already tested this here" skip.

use std::fmt;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

/// Ordered host description, most general element first.
///
/// On Linux: distribution name, distribution version, architecture, kernel
/// release, hostname. Elsewhere: OS, architecture, kernel release, hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineSignature(Vec<String>);

impl MachineSignature {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Describe the current host. Detection never fails; unknowable parts
    /// degrade to "unknown".
    pub fn detect() -> Self {
        let arch = std::env::consts::ARCH.to_string();
        let release = command_line("uname", &["-r"]).unwrap_or_else(|| "unknown".to_string());
        let node = hostname().unwrap_or_else(|| "unknown".to_string());

        if std::env::consts::OS == "linux" {
            if let Some((dist, dist_version)) = linux_distribution("/etc/os-release") {
                return Self(vec![dist, dist_version, arch, release, node]);
            }
        }
        Self(vec![std::env::consts::OS.to_string(), arch, release, node])
    }

    /// Prefix equivalence: both signatures agree on the first `depth`
    /// elements (and both actually have them).
    pub fn matches_prefix(&self, other: &MachineSignature, depth: usize) -> bool {
        let a = &self.0[..self.0.len().min(depth)];
        let b = &other.0[..other.0.len().min(depth)];
        a == b
    }

    /// Reports in the wild carry signatures in whatever shape the bot that
    /// wrote them used; anything that is not an array of strings is legacy.
    pub fn from_value(value: &serde_json::Value) -> Option<MachineSignature> {
        let parts = value
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?;
        Some(Self(parts))
    }
}

impl fmt::Display for MachineSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

fn command_line(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn hostname() -> Option<String> {
    if let Ok(text) = std::fs::read_to_string("/etc/hostname") {
        let text = text.trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty())
}

/// Pull NAME and VERSION_ID out of an os-release file.
fn linux_distribution(path: impl AsRef<Path>) -> Option<(String, String)> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut name = None;
    let mut version = None;
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("NAME=") {
            name = Some(unquote(value));
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version = Some(unquote(value));
        }
    }
    Some((name?, version.unwrap_or_else(|| "unknown".to_string())))
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

/// Element-wise difference between a prior report's host and this one.
///
/// Lexicographically smaller means more alike; the selector keeps the
/// minimum over all prior reports and prefers candidates whose minimum is
/// still large. Only the trailing element decides full redundancy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RedundancyVector(Vec<u8>);

impl RedundancyVector {
    /// Sentinel for a ticket nothing has tested yet; compares above every
    /// real difference vector.
    pub fn never_tested() -> Self {
        Self(vec![100])
    }

    /// Fixed vector for legacy signature shapes: some coverage signal, but
    /// never full redundancy.
    pub fn legacy() -> Self {
        Self(vec![1])
    }

    /// Compare a prior report's machine value against the current host.
    ///
    /// Both signatures are truncated to `depth`, then differ element-wise;
    /// a trailing 1 is appended when the truncated signatures differ in
    /// length, so a shape mismatch can never read as fully redundant.
    pub fn between(prior: &serde_json::Value, current: &MachineSignature, depth: usize) -> Self {
        let Some(prior) = MachineSignature::from_value(prior) else {
            return Self::legacy();
        };
        let a = &prior.0[..prior.0.len().min(depth)];
        let b = &current.0[..current.0.len().min(depth)];
        let mut diff: Vec<u8> = a.iter().zip(b.iter()).map(|(x, y)| u8::from(x != y)).collect();
        if a.len() != b.len() {
            diff.push(1);
        }
        Self(diff)
    }

    /// Fully redundant means the trailing element is a zero: same prefix,
    /// same length. An empty vector carries no such evidence.
    pub fn is_fully_redundant(&self) -> bool {
        self.0.last() == Some(&0)
    }
}

impl fmt::Display for RedundancyVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

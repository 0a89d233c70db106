//! Ticket records and prior test reports
//!
//! Tickets arrive from the tracker as JSON and carry everything the scorer
//! needs: patch list, dependency list, authorship, and the reports other
//! bots have already filed against them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending reports older than this no longer count as coverage.
pub const PENDING_TTL_HOURS: i64 = 6;

/// A candidate ticket as fetched from the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    //=== Identity ===
    /// Tracker id; id 0 is the clean baseline environment
    pub id: u64,

    #[serde(default)]
    pub title: String,

    //=== People ===
    /// Patch authors; every one must be trusted for the ticket to run
    #[serde(default)]
    pub authors: Vec<String>,

    /// Everyone who touched the ticket, authors included
    #[serde(default)]
    pub participants: Vec<String>,

    //=== Content ===
    /// Patch file names, in application order
    #[serde(default)]
    pub patches: Vec<String>,

    /// Ticket ids or base-version strings this ticket needs
    #[serde(default)]
    pub depends_on: Vec<Dependency>,

    /// Unresolved package prerequisites; non-empty means untestable
    #[serde(default)]
    pub spkgs: Vec<String>,

    //=== Classification ===
    #[serde(default)]
    pub component: Option<String>,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub priority: String,

    //=== Testing state ===
    /// Force a retest even when prior reports cover this machine
    #[serde(default)]
    pub retry: bool,

    /// Reports already filed against this ticket
    #[serde(default)]
    pub reports: Vec<PriorReport>,
}

/// One entry of a ticket's dependency list.
///
/// The tracker mixes ticket ids and version strings in the same array, so
/// this deserializes untagged: numbers become `Ticket`, strings `Version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Ticket(u64),
    Version(String),
}

impl Dependency {
    /// A dependency constrains the base only when it looks like a dotted
    /// version string; bare ticket ids and tag-like strings do not.
    pub fn version_requirement(&self) -> Option<&str> {
        match self {
            Dependency::Version(s) if s.contains('.') => Some(s),
            _ => None,
        }
    }
}

/// A report some bot already posted for a ticket.
///
/// Fields stay loose on purpose: old reports in the wild carry machine
/// signatures and timestamps in shapes this crate no longer writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorReport {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub base: String,

    /// Usually a JSON array of strings; legacy reports used objects
    #[serde(default)]
    pub machine: serde_json::Value,

    #[serde(default)]
    pub time: Option<String>,
}

impl PriorReport {
    pub fn is_pending(&self) -> bool {
        self.status == "Pending"
    }

    /// Parse the report timestamp, accepting both RFC 3339 and the legacy
    /// space-separated format.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.time.as_deref()?;
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Some(t.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|t| t.and_utc())
    }

    /// A pending report only counts while fresh; a bot that died mid-run
    /// must not block the ticket forever.
    fn counts_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_pending() {
            return true;
        }
        match self.timestamp() {
            Some(t) => now.signed_duration_since(t).num_hours() < PENDING_TTL_HOURS,
            None => false,
        }
    }
}

impl Ticket {
    /// Prior reports that bear on testing this ticket at `base`: same base
    /// version, with stale pending entries pruned.
    pub fn current_reports(&self, base: &str) -> Vec<&PriorReport> {
        self.current_reports_at(base, Utc::now())
    }

    fn current_reports_at(&self, base: &str, now: DateTime<Utc>) -> Vec<&PriorReport> {
        self.reports
            .iter()
            .filter(|r| r.base == base)
            .filter(|r| r.counts_at(now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn report(status: &str, base: &str, age_hours: i64, now: DateTime<Utc>) -> PriorReport {
        PriorReport {
            status: status.to_string(),
            base: base.to_string(),
            machine: serde_json::json!(["linux", "1.0", "x86_64"]),
            time: Some((now - Duration::hours(age_hours)).to_rfc3339()),
        }
    }

    #[test]
    fn test_ticket_deserializes_with_defaults() {
        let ticket: Ticket = serde_json::from_str(r#"{"id": 12345}"#).unwrap();
        assert_eq!(ticket.id, 12345);
        assert!(ticket.patches.is_empty());
        assert!(ticket.spkgs.is_empty());
        assert!(ticket.reports.is_empty());
        assert!(!ticket.retry);
        assert!(ticket.component.is_none());
    }

    #[test]
    fn test_dependency_untagged_parse() {
        let deps: Vec<Dependency> = serde_json::from_str(r#"[4711, "1.2.3", "feature-x"]"#).unwrap();
        assert_eq!(deps[0], Dependency::Ticket(4711));
        assert_eq!(deps[1], Dependency::Version("1.2.3".to_string()));
        assert_eq!(deps[2], Dependency::Version("feature-x".to_string()));
    }

    #[test]
    fn test_version_requirement_needs_a_dot() {
        assert_eq!(
            Dependency::Version("1.2.3".to_string()).version_requirement(),
            Some("1.2.3")
        );
        assert_eq!(Dependency::Version("feature-x".to_string()).version_requirement(), None);
        assert_eq!(Dependency::Ticket(42).version_requirement(), None);
    }

    #[test]
    fn test_current_reports_filters_base() {
        let now = Utc::now();
        let ticket = Ticket {
            reports: vec![report("TestsPassed", "1.0", 48, now), report("TestsPassed", "2.0", 48, now)],
            ..serde_json::from_str::<Ticket>(r#"{"id": 1}"#).unwrap()
        };
        let current = ticket.current_reports_at("1.0", now);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].base, "1.0");
    }

    #[test]
    fn test_stale_pending_reports_are_pruned() {
        let now = Utc::now();
        let ticket = Ticket {
            reports: vec![
                report("Pending", "1.0", 1, now),
                report("Pending", "1.0", PENDING_TTL_HOURS + 1, now),
                report("TestsFailed", "1.0", 500, now),
            ],
            ..serde_json::from_str::<Ticket>(r#"{"id": 1}"#).unwrap()
        };
        let current = ticket.current_reports_at("1.0", now);
        assert_eq!(current.len(), 2);
        assert!(current.iter().any(|r| r.status == "Pending"));
        assert!(current.iter().any(|r| r.status == "TestsFailed"));
    }

    #[test]
    fn test_pending_without_timestamp_is_pruned() {
        let now = Utc::now();
        let mut r = report("Pending", "1.0", 0, now);
        r.time = None;
        let ticket = Ticket {
            reports: vec![r],
            ..serde_json::from_str::<Ticket>(r#"{"id": 1}"#).unwrap()
        };
        assert!(ticket.current_reports_at("1.0", now).is_empty());
    }

    #[test]
    fn test_legacy_timestamp_parses() {
        let r = PriorReport {
            status: "TestsPassed".to_string(),
            base: "1.0".to_string(),
            machine: serde_json::Value::Null,
            time: Some("2012-03-01 04:00:12".to_string()),
        };
        assert!(r.timestamp().is_some());
    }

    #[test]
    fn test_legacy_machine_shape_still_deserializes() {
        let raw = r#"{"status": "TestsPassed", "base": "1.0", "machine": {"os": "linux"}}"#;
        let r: PriorReport = serde_json::from_str(raw).unwrap();
        assert!(r.machine.is_object());
    }
}

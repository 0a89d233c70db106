//! Ticket rating and skip rules
//!
//! Rating is additive over the configured bonus table; skips are routine
//! outcomes that shrink the candidate pool for this cycle, not errors.

use std::fmt;

use crate::config::BotConfig;
use crate::machine::RedundancyVector;
use crate::ticket::Ticket;
use crate::version;

use super::score::ScoreResult;

/// Why a ticket is not testable this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Unresolved package prerequisites
    UnresolvedPackages,
    /// Nothing to apply
    NoPatches,
    /// A dependency wants a newer base than this bot runs
    BaseTooOld { required: String },
    /// An author is not on the trusted list
    UntrustedAuthor { author: String },
    /// An equivalent machine already reported at this base
    AlreadyCovered,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnresolvedPackages => write!(f, "unresolved packages"),
            SkipReason::NoPatches => write!(f, "no patches"),
            SkipReason::BaseTooOld { required } => write!(f, "needs base {required}"),
            SkipReason::UntrustedAuthor { author } => write!(f, "untrusted author {author}"),
            SkipReason::AlreadyCovered => write!(f, "already covered here"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateOutcome {
    Scored(ScoreResult),
    Skipped(SkipReason),
}

impl RateOutcome {
    pub fn into_score(self) -> Option<ScoreResult> {
        match self {
            RateOutcome::Scored(score) => Some(score),
            RateOutcome::Skipped(_) => None,
        }
    }
}

pub fn rate_ticket(ticket: &Ticket, conf: &BotConfig) -> RateOutcome {
    use RateOutcome::Skipped;

    if !ticket.spkgs.is_empty() {
        return Skipped(SkipReason::UnresolvedPackages);
    }
    if ticket.patches.is_empty() {
        return Skipped(SkipReason::NoPatches);
    }
    for dep in &ticket.depends_on {
        if let Some(required) = dep.version_requirement() {
            if version::is_newer_than(required, &conf.base) {
                return Skipped(SkipReason::BaseTooOld {
                    required: required.to_string(),
                });
            }
        }
    }

    let mut rating = 0i64;
    for author in &ticket.authors {
        if !conf.is_trusted(author) {
            return Skipped(SkipReason::UntrustedAuthor {
                author: author.clone(),
            });
        }
        rating += conf.bonus_for(author);
    }
    // authors show up again here; counting them twice is deliberate weighting
    for participant in &ticket.participants {
        rating += conf.bonus_for(participant);
    }
    rating += ticket.participants.len() as i64;
    if let Some(component) = &ticket.component {
        rating += conf.bonus_for(component);
    }
    rating += conf.bonus_for(&ticket.status);
    rating += conf.bonus_for(&ticket.priority);
    rating += conf.bonus_for(&ticket.id.to_string());

    let mut redundancy = RedundancyVector::never_tested();
    if !ticket.retry {
        for report in ticket.current_reports(&conf.base) {
            redundancy = redundancy.min(RedundancyVector::between(
                &report.machine,
                &conf.machine,
                conf.machine_match,
            ));
        }
    }
    if redundancy.is_fully_redundant() {
        return Skipped(SkipReason::AlreadyCovered);
    }

    RateOutcome::Scored(ScoreResult {
        redundancy,
        rating,
        ticket_id: ticket.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use serde_json::json;

    fn conf() -> BotConfig {
        conf_with(|_| {})
    }

    fn conf_with(tweak: impl FnOnce(&mut FileConfig)) -> BotConfig {
        let mut file = FileConfig::default();
        file.machine = Some(vec!["Debian".into(), "12".into(), "x86_64".into()]);
        tweak(&mut file);
        BotConfig::resolve(file, "4.8".into(), vec!["alice".into(), "bob".into()]).unwrap()
    }

    fn ticket(value: serde_json::Value) -> Ticket {
        serde_json::from_value(value).unwrap()
    }

    fn base_candidate() -> serde_json::Value {
        json!({
            "id": 100,
            "title": "A fix",
            "authors": ["alice"],
            "participants": ["alice"],
            "patches": ["p1.patch"],
            "depends_on": [],
            "spkgs": [],
            "status": "needs_review",
            "priority": "major"
        })
    }

    #[test]
    fn test_unresolved_packages_skip() {
        let mut t = base_candidate();
        t["spkgs"] = json!(["libfoo"]);
        assert_eq!(
            rate_ticket(&ticket(t), &conf()),
            RateOutcome::Skipped(SkipReason::UnresolvedPackages)
        );
    }

    #[test]
    fn test_no_patches_skip() {
        let mut t = base_candidate();
        t["patches"] = json!([]);
        assert_eq!(
            rate_ticket(&ticket(t), &conf()),
            RateOutcome::Skipped(SkipReason::NoPatches)
        );
    }

    #[test]
    fn test_newer_base_dependency_skip() {
        let mut t = base_candidate();
        t["depends_on"] = json!([99, "4.8.1"]);
        assert_eq!(
            rate_ticket(&ticket(t), &conf()),
            RateOutcome::Skipped(SkipReason::BaseTooOld {
                required: "4.8.1".into()
            })
        );
    }

    #[test]
    fn test_old_version_dependency_is_fine() {
        let mut t = base_candidate();
        t["depends_on"] = json!(["4.7", 1234, "feature-x"]);
        assert!(matches!(rate_ticket(&ticket(t), &conf()), RateOutcome::Scored(_)));
    }

    #[test]
    fn test_untrusted_author_skip() {
        let mut t = base_candidate();
        t["authors"] = json!(["alice", "mallory"]);
        assert_eq!(
            rate_ticket(&ticket(t), &conf()),
            RateOutcome::Skipped(SkipReason::UntrustedAuthor {
                author: "mallory".into()
            })
        );
    }

    #[test]
    fn test_rating_formula_for_fresh_candidate() {
        // needs_review 1000 + one participant + no bonus for "major"
        let outcome = rate_ticket(&ticket(base_candidate()), &conf());
        let score = outcome.into_score().unwrap();
        assert_eq!(score.rating, 1001);
        assert_eq!(score.redundancy, RedundancyVector::never_tested());
        assert_eq!(score.ticket_id, 100);
    }

    #[test]
    fn test_authors_also_count_as_participants() {
        let c = conf_with(|file| {
            file.bonus.insert("alice".into(), 7);
        });
        let mut t = base_candidate();
        t["participants"] = json!(["alice", "carol"]);
        let score = rate_ticket(&ticket(t), &c).into_score().unwrap();
        // author bonus 7, participant pass 7 again, 2 participants, status 1000
        assert_eq!(score.rating, 7 + 7 + 2 + 1000);
    }

    #[test]
    fn test_component_priority_and_id_bonuses() {
        let c = conf_with(|file| {
            file.bonus.insert("linear_algebra".into(), 11);
            file.bonus.insert("major".into(), 5);
            file.bonus.insert("100".into(), 3);
        });
        let mut t = base_candidate();
        t["component"] = json!("linear_algebra");
        let score = rate_ticket(&ticket(t), &c).into_score().unwrap();
        assert_eq!(score.rating, 1000 + 1 + 11 + 5 + 3);
    }

    #[test]
    fn test_fully_covered_ticket_skips() {
        let mut t = base_candidate();
        t["reports"] = json!([{
            "status": "TestsPassed",
            "base": "4.8",
            "machine": ["Debian", "12", "x86_64", "6.1.0", "otherhost"]
        }]);
        assert_eq!(
            rate_ticket(&ticket(t), &conf()),
            RateOutcome::Skipped(SkipReason::AlreadyCovered)
        );
    }

    #[test]
    fn test_report_at_other_base_does_not_cover() {
        let mut t = base_candidate();
        t["reports"] = json!([{
            "status": "TestsPassed",
            "base": "4.7",
            "machine": ["Debian", "12", "x86_64"]
        }]);
        assert!(matches!(rate_ticket(&ticket(t), &conf()), RateOutcome::Scored(_)));
    }

    #[test]
    fn test_different_machine_reduces_redundancy_without_skip() {
        let mut t = base_candidate();
        t["reports"] = json!([{
            "status": "TestsPassed",
            "base": "4.8",
            "machine": ["Debian", "12", "aarch64"]
        }]);
        let score = rate_ticket(&ticket(t), &conf()).into_score().unwrap();
        assert!(score.redundancy < RedundancyVector::never_tested());
        assert!(!score.redundancy.is_fully_redundant());
    }

    #[test]
    fn test_trailing_element_alone_decides_coverage() {
        // earlier elements differ, but the last compared one matches
        let mut t = base_candidate();
        t["reports"] = json!([{
            "status": "TestsPassed",
            "base": "4.8",
            "machine": ["Fedora", "39", "x86_64"]
        }]);
        assert_eq!(
            rate_ticket(&ticket(t), &conf()),
            RateOutcome::Skipped(SkipReason::AlreadyCovered)
        );
    }

    #[test]
    fn test_retry_ignores_prior_reports() {
        let mut t = base_candidate();
        t["retry"] = json!(true);
        t["reports"] = json!([{
            "status": "TestsPassed",
            "base": "4.8",
            "machine": ["Debian", "12", "x86_64"]
        }]);
        let score = rate_ticket(&ticket(t), &conf()).into_score().unwrap();
        assert_eq!(score.redundancy, RedundancyVector::never_tested());
    }

    #[test]
    fn test_legacy_machine_report_never_fully_covers() {
        let mut t = base_candidate();
        t["reports"] = json!([{
            "status": "TestsPassed",
            "base": "4.8",
            "machine": {"os": "linux"}
        }]);
        let score = rate_ticket(&ticket(t), &conf()).into_score().unwrap();
        assert_eq!(score.redundancy, RedundancyVector::legacy());
    }
}

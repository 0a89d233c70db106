//! Candidate selection

use crate::config::BotConfig;
use crate::ticket::Ticket;

use super::rate::{RateOutcome, rate_ticket};
use super::score::ScoreResult;

/// A ticket together with its score for this cycle.
#[derive(Debug, Clone)]
pub struct ScoredTicket {
    pub score: ScoreResult,
    pub ticket: Ticket,
}

/// Score every candidate, dropping skips with a debug note.
pub fn score_all(tickets: Vec<Ticket>, conf: &BotConfig) -> Vec<ScoredTicket> {
    tickets
        .into_iter()
        .filter_map(|ticket| match rate_ticket(&ticket, conf) {
            RateOutcome::Scored(score) => Some(ScoredTicket { score, ticket }),
            RateOutcome::Skipped(reason) => {
                log::debug!("skipping #{}: {}", ticket.id, reason);
                None
            }
        })
        .collect()
}

/// The single best candidate under the score order.
pub fn select_best(scored: Vec<ScoredTicket>) -> Option<ScoredTicket> {
    scored.into_iter().max_by(|a, b| a.score.cmp(&b.score))
}

/// All scored candidates, worst first. The listing mode prints these.
pub fn rank_all(mut scored: Vec<ScoredTicket>) -> Vec<ScoredTicket> {
    scored.sort_by(|a, b| a.score.cmp(&b.score));
    scored
}

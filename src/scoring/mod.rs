//! Scoring and selection of candidate tickets

pub mod rate;
pub mod score;
pub mod select;

pub use rate::{RateOutcome, SkipReason, rate_ticket};
pub use score::ScoreResult;
pub use select::{ScoredTicket, rank_all, score_all, select_best};

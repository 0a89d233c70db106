//! Candidate score and its ordering

use std::cmp::Ordering;
use std::fmt;

use crate::machine::RedundancyVector;

/// Score of one testable candidate.
///
/// The total order puts the best candidate at the maximum: least-covered
/// redundancy first, then higher rating, then lower ticket id. The id term
/// makes selection deterministic across bots seeing the same pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    pub redundancy: RedundancyVector,
    pub rating: i64,
    pub ticket_id: u64,
}

impl Ord for ScoreResult {
    fn cmp(&self, other: &Self) -> Ordering {
        self.redundancy
            .cmp(&other.redundancy)
            .then_with(|| self.rating.cmp(&other.rating))
            .then_with(|| other.ticket_id.cmp(&self.ticket_id))
    }
}

impl PartialOrd for ScoreResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScoreResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "redundancy={} rating={} ticket={}",
            self.redundancy, self.rating, self.ticket_id
        )
    }
}

//! Candidate ticket source
//!
//! The tracker is where candidate tickets live. The bot only ever reads
//! from it; all writes go to the report server. The trait seam keeps the
//! scheduler testable without a network.

pub mod http;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::ticket::Ticket;

pub use http::HttpTracker;

#[async_trait]
pub trait Tracker: Send + Sync {
    /// Open tickets ready for testing, optionally restricted to an author
    /// allow-list.
    async fn open_tickets(&self, trusted: Option<&[String]>) -> Result<Vec<Ticket>>;

    /// Fresh record for a single ticket, bypassing the query index. Used
    /// for explicitly queued ids and the baseline ticket 0.
    async fn lookup(&self, id: u64) -> Result<Ticket>;

    /// Authors the server vouches for; used when the config file does not
    /// pin its own trusted list.
    async fn trusted_authors(&self) -> Result<Vec<String>>;

    /// Ids of closed tickets, for working-copy cleanup.
    async fn closed_tickets(&self) -> Result<HashSet<u64>>;
}

/// Keep only tickets whose whole author set is inside the allow-list.
/// The server applies the same filter; this re-check keeps a stale or
/// overly chatty server from slipping an untrusted patch into the pool.
pub fn filter_on_authors(tickets: Vec<Ticket>, trusted: Option<&[String]>) -> Vec<Ticket> {
    let Some(trusted) = trusted else {
        return tickets;
    };
    let allowed: HashSet<&str> = trusted.iter().map(String::as_str).collect();
    tickets
        .into_iter()
        .filter(|t| t.authors.iter().all(|a| allowed.contains(a.as_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(id: u64, authors: &[&str]) -> Ticket {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "authors": authors,
        }))
        .unwrap()
    }

    #[test]
    fn test_filter_on_authors_requires_subset() {
        let pool = vec![
            ticket(1, &["alice"]),
            ticket(2, &["alice", "mallory"]),
            ticket(3, &[]),
        ];
        let trusted = vec!["alice".to_string(), "bob".to_string()];
        let kept = filter_on_authors(pool, Some(&trusted));
        let ids: Vec<u64> = kept.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_filter_on_authors_none_keeps_all() {
        let pool = vec![ticket(1, &["anyone"]), ticket(2, &["mallory"])];
        assert_eq!(filter_on_authors(pool, None).len(), 2);
    }
}

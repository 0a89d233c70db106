//! HTTP tracker client

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::error::{PatchbotError, Result};
use crate::ticket::Ticket;

use super::{Tracker, filter_on_authors};

/// Per-request timeout; tracker queries are small.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpTracker {
    client: Client,
    server: String,
}

impl HttpTracker {
    pub fn new(server: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PatchbotError::Tracker(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            server: server.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PatchbotError::Tracker(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(PatchbotError::Tracker(format!("{url} returned {status}: {body}")));
        }
        response
            .text()
            .await
            .map_err(|e| PatchbotError::Tracker(format!("failed to read {url}: {e}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get_text(url).await?;
        serde_json::from_str(&text)
            .map_err(|e| PatchbotError::Tracker(format!("bad JSON from {url}: {e}")))
    }
}

#[async_trait]
impl Tracker for HttpTracker {
    async fn open_tickets(&self, trusted: Option<&[String]>) -> Result<Vec<Ticket>> {
        let mut url = format!("{}/ticket/?raw&status=open&todo", self.server);
        if let Some(trusted) = trusted {
            url.push_str("&authors=");
            url.push_str(&trusted.join(":"));
        }
        let tickets: Vec<Ticket> = self.get_json(&url).await?;
        Ok(filter_on_authors(tickets, trusted))
    }

    async fn lookup(&self, id: u64) -> Result<Ticket> {
        let url = format!("{}/ticket/{}/?raw", self.server, id);
        self.get_json(&url).await
    }

    async fn trusted_authors(&self) -> Result<Vec<String>> {
        let url = format!("{}/trusted/", self.server);
        let table: serde_json::Map<String, serde_json::Value> = self.get_json(&url).await?;
        let mut authors: Vec<String> = table.keys().cloned().collect();
        authors.sort();
        Ok(authors)
    }

    async fn closed_tickets(&self) -> Result<HashSet<u64>> {
        let url = format!("{}/ticket/?status=closed", self.server);
        let body = self.get_text(&url).await?;
        let pattern = Regex::new(r"/ticket/(\d+)/")
            .map_err(|e| PatchbotError::Tracker(format!("bad ticket pattern: {e}")))?;
        let mut closed = HashSet::new();
        for capture in pattern.captures_iter(&body) {
            if let Ok(id) = capture[1].parse::<u64>() {
                closed.insert(id);
            }
        }
        Ok(closed)
    }
}

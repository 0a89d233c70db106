//! Report delivery with bounded retry

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

use crate::error::{PatchbotError, Result};

use super::types::Report;

/// Transient server trouble should not lose a finished run, but the bot must
/// not stall on it forever either.
const REPORT_ATTEMPTS: usize = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct Reporter {
    client: Client,
    server: String,
    retry_delay: Duration,
}

impl Reporter {
    pub fn new(server: impl Into<String>, retry_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PatchbotError::Report(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            server: server.into().trim_end_matches('/').to_string(),
            retry_delay,
        })
    }

    /// Posts a final report, attaching the gzipped run log when one exists.
    /// Retries up to [`REPORT_ATTEMPTS`] times with a fixed pause between
    /// tries before giving up.
    pub async fn report(&self, ticket_id: u64, report: &Report, log: Option<&Path>) -> Result<()> {
        let url = format!("{}/report/{}", self.server, ticket_id);
        let json = serde_json::to_string(report)?;
        let compressed = match log {
            Some(path) => Some(gzip_bytes(&tokio::fs::read(path).await?)?),
            None => None,
        };

        for attempt in 1..=REPORT_ATTEMPTS {
            match self.post_once(&url, &json, compressed.as_deref()).await {
                Ok(()) => {
                    log::info!("reported {} for ticket {}", report.status, ticket_id);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "report attempt {}/{} for ticket {} failed: {}",
                        attempt,
                        REPORT_ATTEMPTS,
                        ticket_id,
                        e
                    );
                    if attempt < REPORT_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(PatchbotError::Report(format!(
            "gave up on ticket {ticket_id} after {REPORT_ATTEMPTS} attempts"
        )))
    }

    /// Posts the provisional claim before testing starts. One attempt only;
    /// a missed claim just means other bots may duplicate the work.
    pub async fn report_pending(&self, ticket_id: u64, report: &Report) -> Result<()> {
        let url = format!("{}/report/{}", self.server, ticket_id);
        let json = serde_json::to_string(report)?;
        self.post_once(&url, &json, None).await
    }

    async fn post_once(&self, url: &str, json: &str, log: Option<&[u8]>) -> Result<()> {
        let mut form = Form::new().text("report", json.to_string());
        if let Some(bytes) = log {
            let part = Part::bytes(bytes.to_vec()).file_name("log.gz");
            form = form.part("log", part);
        }
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PatchbotError::Report(format!("post to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(PatchbotError::Report(format!("{url} returned {status}: {body}")));
        }
        Ok(())
    }
}

fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BotConfig, FileConfig};
    use crate::report::types::{PluginOutcome, ReportStatus};
    use crate::ticket::Ticket;
    use mockito::Matcher;
    use std::io::Read;

    fn test_report(status: ReportStatus) -> Report {
        let mut file = FileConfig::default();
        file.machine = Some(vec!["Debian".into(), "12".into(), "x86_64".into()]);
        file.user = Some("botuser".into());
        let conf = BotConfig::resolve(file, "1.4".into(), vec![]).unwrap();
        let ticket: Ticket =
            serde_json::from_str(r#"{"id": 123, "patches": ["fix.patch"]}"#).unwrap();
        Report::new(status, &ticket, &conf, vec![PluginOutcome::new("coverage", true)])
    }

    #[test]
    fn test_gzip_roundtrip() {
        let compressed = gzip_bytes(b"build log line\n").unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut restored = String::new();
        decoder.read_to_string(&mut restored).unwrap();
        assert_eq!(restored, "build log line\n");
    }

    #[tokio::test]
    async fn test_report_posts_multipart_with_log() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/report/123")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("name=\"report\"".into()),
                Matcher::Regex("TestsPassed".into()),
                Matcher::Regex("filename=\"log.gz\"".into()),
            ]))
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("123.log");
        std::fs::write(&log_path, "all tests passed\n").unwrap();

        let reporter = Reporter::new(server.url(), Duration::from_millis(1)).unwrap();
        let report = test_report(ReportStatus::TestsPassed);
        reporter.report(123, &report, Some(&log_path)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_report_gives_up_after_five_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/report/55")
            .with_status(500)
            .with_body("overloaded")
            .expect(5)
            .create_async()
            .await;

        let reporter = Reporter::new(server.url(), Duration::from_millis(1)).unwrap();
        let report = test_report(ReportStatus::BuildFailed);
        let err = reporter.report(55, &report, None).await.unwrap_err();
        mock.assert_async().await;
        assert!(err.to_string().contains("gave up"));
    }

    #[tokio::test]
    async fn test_pending_is_single_shot() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/report/88")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let reporter = Reporter::new(server.url(), Duration::from_millis(1)).unwrap();
        let report = test_report(ReportStatus::Pending);
        assert!(reporter.report_pending(88, &report).await.is_err());
        mock.assert_async().await;
    }
}

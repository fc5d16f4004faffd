use std::{
    fmt,
    time::{
        Duration,
        Instant,
    },
};

use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};

use crate::summary::SummaryPayload;

pub const SUMMARY_PATH: &str = "/api/summary";
pub const DEFAULT_SUMMARY_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can produce the latest summary payload.
pub trait SummarySource {
    fn fetch_summary(&self) -> impl Future<Output = Result<SummaryPayload>> + Send;
}

#[derive(Clone)]
pub struct SummaryClient {
    base_url: String,
    http: reqwest::Client,
}

impl SummaryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("failed to build HTTP client for summary server")?;
        Ok(Self { base_url, http })
    }

    pub fn summary_url(&self) -> String {
        format!("{}{}", self.base_url, SUMMARY_PATH)
    }

    /// Non-2xx statuses, transport failures and undecodable bodies all come
    /// back as `Err`; callers do not tell them apart.
    pub async fn latest_summary(&self) -> Result<SummaryPayload> {
        let started = Instant::now();
        let res = self
            .http
            .get(self.summary_url())
            .send()
            .await
            .wrap_err("summary request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read summary response body")?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!(
                "summary server responded with {status} when fetching {SUMMARY_PATH}: {body}"
            ));
        }
        let payload: SummaryPayload =
            serde_json::from_slice(&bytes).wrap_err("invalid summary payload")?;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            transfers = payload.ticket_transfers.len(),
            "fetched summary"
        );
        Ok(payload)
    }
}

impl SummarySource for SummaryClient {
    fn fetch_summary(&self) -> impl Future<Output = Result<SummaryPayload>> + Send {
        self.latest_summary()
    }
}

impl fmt::Display for SummaryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

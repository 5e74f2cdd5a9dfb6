//! HTTP client for OpenSky aircraft metadata.
//!
//! Each lookup is a single bounded-time GET. The client never retries; the
//! metadata cache turns every non-success into a permanent negative entry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::MetadataConfig;
use crate::domain::ports::{LookupOutcome, MetadataSource};

use super::models::OpenSkyAircraftRecord;

const USER_AGENT: &str = concat!("airtrack/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct OpenSkyMetadataClient {
    http: Client,
    base_url: String,
}

impl OpenSkyMetadataClient {
    /// Build a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DomainError::LookupFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &MetadataConfig) -> DomainResult<Self> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    fn url_for(&self, icao24: &str) -> String {
        format!("{}/{}", self.base_url, icao24)
    }
}

#[async_trait]
impl MetadataSource for OpenSkyMetadataClient {
    async fn lookup(&self, icao24: &str) -> LookupOutcome {
        let url = self.url_for(icao24);

        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return LookupOutcome::Failed(format!("OpenSky lookup timed out: {e}"));
            }
            Err(e) => return LookupOutcome::Failed(format!("OpenSky request failed: {e}")),
        };

        match resp.status() {
            StatusCode::NOT_FOUND => LookupOutcome::NotFound,
            status if status.is_success() => match resp.json::<OpenSkyAircraftRecord>().await {
                Ok(record) => LookupOutcome::Found(record.into()),
                Err(e) => LookupOutcome::Failed(format!("OpenSky response parse failed: {e}")),
            },
            status => {
                let body = resp.text().await.unwrap_or_default();
                LookupOutcome::Failed(format!("OpenSky returned {status}: {body}"))
            }
        }
    }
}

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::config::ScraperConfig;
use crate::sites::SiteId;

/// A fetched page body plus the URL the request actually landed on after
/// redirects.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub body: String,
    pub final_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} fetching {url}")]
    HttpStatus { url: String, status: StatusCode },
}

impl FetchError {
    /// Transient failures are worth another attempt: connection-level errors,
    /// timeouts, 429, and the retryable 5xx family. Other statuses (notably
    /// 403/404) fail immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network { .. } | FetchError::Timeout { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
            }
        }
    }

    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source,
            }
        }
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(8);
const MAX_REDIRECTS: usize = 10;

/// HTTP retrieval with per-site headers and timeouts, redirect following, and
/// bounded retry with exponential backoff. Holds one client per site id so
/// each site's connect timeout and header set apply to the whole connection.
pub struct Fetcher {
    clients: HashMap<SiteId, Client>,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl Fetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut clients = HashMap::new();
        for site in SiteId::ALL {
            let profile = site.profile();
            let mut headers = HeaderMap::new();
            for (name, value) in profile.request_headers {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .with_context(|| format!("invalid header name for site {site}"))?;
                let value = HeaderValue::from_str(value)
                    .with_context(|| format!("invalid header value for site {site}"))?;
                headers.insert(name, value);
            }
            let client = Client::builder()
                .default_headers(headers)
                .connect_timeout(profile.connect_timeout)
                .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
                .build()
                .with_context(|| format!("failed to build HTTP client for site {site}"))?;
            clients.insert(site, client);
        }

        Ok(Self {
            clients,
            retry_attempts: config.retry_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    /// GETs `url` with the profile resolved for `site`. Transient failures are
    /// retried up to the configured attempt count with doubling backoff; the
    /// last error is returned once attempts are exhausted.
    pub async fn fetch(&self, url: &str, site: SiteId) -> Result<RawPage, FetchError> {
        let backoff = ExponentialBackoff::from_millis(2)
            .factor(self.retry_base_delay.as_millis() as u64)
            .max_delay(MAX_BACKOFF)
            .take(self.retry_attempts.saturating_sub(1) as usize);

        RetryIf::spawn(backoff, || self.fetch_once(url, site), FetchError::is_transient).await
    }

    async fn fetch_once(&self, url: &str, site: SiteId) -> Result<RawPage, FetchError> {
        let profile = site.profile();
        // Every SiteId has a client; the map is populated from SiteId::ALL.
        let client = &self.clients[&site];

        let response = client
            .get(url)
            .timeout(profile.read_timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(RawPage { body, final_url })
    }
}

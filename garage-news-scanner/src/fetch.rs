use crate::error::{FetchFailure, Result};
use reqwest::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str =
    "GarageNews/0.1 (+https://github.com/trapdoorsec/garage-news)";
const MAX_REDIRECTS: usize = 5;
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Bodies longer than this are truncated.
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// What kind of document a fetch expects, which decides the acceptable content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Feed,
}

impl ContentKind {
    /// Check a `Content-Type` header value. Parameters such as `charset` are ignored.
    pub fn accepts(&self, content_type: &str) -> bool {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let is_html = mime == "text/html" || mime == "application/xhtml+xml";
        match self {
            ContentKind::Html => is_html,
            ContentKind::Feed => {
                is_html || mime.contains("xml") || mime.contains("rss") || mime.contains("atom")
            }
        }
    }
}

/// Single-shot HTTP GET with a bounded timeout and no retries.
///
/// One `Fetcher` is built per run so every request shares the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::from_config(&FetchConfig::default())
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes.max(1),
        })
    }

    /// Fetch an HTML page (listing page or article).
    pub async fn fetch_html(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        self.fetch(url, ContentKind::Html).await
    }

    /// Fetch an RSS or Atom document.
    pub async fn fetch_feed(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        self.fetch(url, ContentKind::Feed).await
    }

    pub async fn fetch(
        &self,
        url: &str,
        kind: ContentKind,
    ) -> std::result::Result<String, FetchFailure> {
        let parsed =
            Url::parse(url).map_err(|e| FetchFailure::Parse(format!("invalid URL {}: {}", url, e)))?;

        debug!("Fetching {}", parsed);
        let start = Instant::now();
        let response = self.client.get(parsed).send().await.map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            FetchFailure::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!("{} returned {}", url, status);
            return Err(FetchFailure::HttpStatus {
                status: status.as_u16(),
            });
        }

        // A missing header is tolerated; plenty of small sites omit it
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            && !kind.accepts(content_type)
        {
            return Err(FetchFailure::ContentType(content_type.to_string()));
        }

        // Within the limit and of known size: let reqwest decode the declared charset
        let body = if response
            .content_length()
            .is_some_and(|len| len <= self.max_body_bytes as u64)
        {
            response.text().await.map_err(FetchFailure::from)?
        } else {
            read_capped(response, self.max_body_bytes, url).await?
        };
        debug!(
            "Fetched {} ({} bytes in {:?})",
            url,
            body.len(),
            start.elapsed()
        );

        Ok(body)
    }
}

/// Read at most `limit` bytes of the body, decoding it as UTF-8.
async fn read_capped(
    mut response: Response,
    limit: usize,
    url: &str,
) -> std::result::Result<String, FetchFailure> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(FetchFailure::from)? {
        let room = limit - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            warn!("Body of {} exceeds {} bytes, truncating", url, limit);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

use chrono::{DateTime, SecondsFormat, Utc};
use garage_news_scanner::classifier::site_domain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 360;

/// How a source's seed URL is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceKind {
    /// RSS or Atom document whose entries link to articles.
    #[default]
    Feed,
    /// HTML page whose anchors are classified into article links.
    ListingPage,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "rss",
            SourceKind::ListingPage => "website",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rss" | "feed" | "atom" => Ok(SourceKind::Feed),
            "website" | "listing" | "listing_page" | "html" => Ok(SourceKind::ListingPage),
            other => Err(format!("unknown source type '{}'", other)),
        }
    }
}

impl TryFrom<String> for SourceKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MINUTES
}

/// A configured news source. Identity is the seed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(rename = "url")]
    pub seed_url: String,
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "polling_interval_minutes", default = "default_poll_interval")]
    pub poll_interval_minutes: u64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl Source {
    pub fn new(display_name: impl Into<String>, seed_url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            display_name: display_name.into(),
            seed_url: seed_url.into(),
            kind,
            category: None,
            poll_interval_minutes: DEFAULT_POLL_INTERVAL_MINUTES,
            tags: BTreeSet::new(),
        }
    }

    pub fn listing(display_name: impl Into<String>, seed_url: impl Into<String>) -> Self {
        Self::new(display_name, seed_url, SourceKind::ListingPage)
    }

    pub fn feed(display_name: impl Into<String>, seed_url: impl Into<String>) -> Self {
        Self::new(display_name, seed_url, SourceKind::Feed)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes * 60)
    }
}

/// One scraped article as written to a record sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub website: String,
    pub article_url: String,
    pub headline: String,
    pub content: String,
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Build an article stamped with the current time. `website` is always
    /// derived from the article URL, never from the page that linked to it.
    pub fn new(article_url: impl Into<String>, headline: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_timestamp(article_url, headline, content, Utc::now())
    }

    pub fn with_timestamp(
        article_url: impl Into<String>,
        headline: impl Into<String>,
        content: impl Into<String>,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        let article_url = article_url.into();
        Self {
            website: site_domain(&article_url).unwrap_or_default(),
            article_url,
            headline: headline.into(),
            content: content.into(),
            scraped_at,
        }
    }
}

/// Storage format for timestamps: RFC 3339, UTC, microseconds, `Z` suffix.
///
/// Fixed width, so string comparison in SQL matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_stored_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A link on a listing page that looks like it points at an article.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateLink {
    pub absolute_url: String,
    pub origin_domain: String,
}

impl CandidateLink {
    pub fn new(absolute_url: String, origin_domain: String) -> Self {
        Self {
            absolute_url,
            origin_domain,
        }
    }
}

/// Best-effort headline and body pulled out of one HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    pub headline: String,
    pub body: String,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.headline.is_empty() && self.body.is_empty()
    }
}

/// One item of an RSS or Atom feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

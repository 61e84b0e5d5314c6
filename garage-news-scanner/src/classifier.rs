use crate::result::CandidateLink;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

/// Path keywords that mark a link as news content unless overridden.
pub const DEFAULT_KEYWORDS: &[&str] = &["news", "article", "story"];

/// Minimum number of non-empty path segments an article link must have.
pub const DEFAULT_MIN_DEPTH: usize = 2;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Tunables for [`LinkClassifier`], loadable from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub keywords: Vec<String>,
    pub min_depth: usize,
    pub match_year_tokens: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            min_depth: DEFAULT_MIN_DEPTH,
            match_year_tokens: true,
        }
    }
}

/// Decides which hrefs on a listing page are plausible article URLs.
///
/// A link is kept when it resolves to the listing page's own domain, has at
/// least `min_depth` path segments and its path mentions one of the keywords
/// (or a year such as `2024` when year tokens are enabled).
#[derive(Debug, Clone)]
pub struct LinkClassifier {
    keywords: Vec<String>,
    min_depth: usize,
    match_year_tokens: bool,
}

impl LinkClassifier {
    pub fn new() -> Self {
        Self::from_settings(&ClassifierSettings::default())
    }

    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        Self::new_unconfigured()
            .with_keywords(settings.keywords.iter().map(String::as_str))
            .with_min_depth(settings.min_depth)
            .with_year_tokens(settings.match_year_tokens)
    }

    fn new_unconfigured() -> Self {
        Self {
            keywords: Vec::new(),
            min_depth: DEFAULT_MIN_DEPTH,
            match_year_tokens: true,
        }
    }

    pub fn with_keywords<'a, I>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn with_min_depth(mut self, depth: usize) -> Self {
        self.min_depth = depth;
        self
    }

    pub fn with_year_tokens(mut self, enabled: bool) -> Self {
        self.match_year_tokens = enabled;
        self
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    /// Resolve `hrefs` against `listing_url` and keep the ones that look like
    /// same-domain articles. An unparsable listing URL yields an empty set.
    pub fn classify<I, S>(&self, listing_url: &str, hrefs: I) -> BTreeSet<CandidateLink>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut links = BTreeSet::new();

        let base = match Url::parse(listing_url) {
            Ok(base) => base,
            Err(e) => {
                warn!("Cannot classify links for invalid listing URL {}: {}", listing_url, e);
                return links;
            }
        };
        let Some(base_domain) = base.host_str().map(normalize_host) else {
            return links;
        };

        for href in hrefs {
            let href = href.as_ref();
            let Some(resolved) = resolve_url(&base, href) else {
                continue;
            };

            if !is_same_domain(&resolved, &base_domain) {
                debug!("  -> {} is cross-domain, skipping", resolved);
                continue;
            }

            if !self.looks_like_article(resolved.path()) {
                debug!("  -> {} does not look like an article", resolved);
                continue;
            }

            links.insert(CandidateLink::new(resolved.to_string(), base_domain.clone()));
        }

        links
    }

    /// Harvest every `a[href]` in `html` and classify them.
    pub fn classify_page(&self, listing_url: &str, html: &str) -> BTreeSet<CandidateLink> {
        let hrefs = harvest_hrefs(html);
        debug!("Harvested {} hrefs from {}", hrefs.len(), listing_url);
        self.classify(listing_url, hrefs)
    }

    /// Keyword and depth heuristic applied to a URL path.
    pub fn looks_like_article(&self, path: &str) -> bool {
        if path_depth(path) < self.min_depth {
            return false;
        }

        let lower = path.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
            || (self.match_year_tokens && has_year_token(&lower))
    }
}

impl Default for LinkClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the raw `href` values of every anchor in a document.
pub fn harvest_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&LINK_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

/// Resolve `href` against `base`, dropping non-web schemes and the fragment.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, in-page anchors
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Lower-case a host and strip a single leading `www.`.
///
/// This is the whole domain policy: no public-suffix handling, so
/// `news.example.com` and `example.com` are different domains.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    }
}

/// The normalized domain of an absolute URL, if it has a host.
pub fn site_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(normalize_host))
}

pub fn is_same_domain(url: &Url, domain: &str) -> bool {
    url.host_str()
        .map(|host| normalize_host(host) == domain)
        .unwrap_or(false)
}

/// Number of non-empty segments in a URL path.
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// True if the path holds a standalone four digit year between 1900 and 2099.
pub fn has_year_token(path: &str) -> bool {
    path.split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() == 4)
        .filter_map(|run| run.parse::<u16>().ok())
        .any(|year| (1900..=2099).contains(&year))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(links: &BTreeSet<CandidateLink>) -> Vec<&str> {
        links.iter().map(|l| l.absolute_url.as_str()).collect()
    }

    #[test]
    fn test_listing_page_scenario() {
        let classifier = LinkClassifier::new();
        let links = classifier.classify(
            "https://example.com/news/",
            [
                "/news/garage-opens-2024",
                "/about",
                "/news/story/2023-repair-boom",
                "https://other.com/news/x",
            ],
        );

        assert_eq!(
            urls(&links),
            vec![
                "https://example.com/news/garage-opens-2024",
                "https://example.com/news/story/2023-repair-boom",
            ]
        );
        assert!(links.iter().all(|l| l.origin_domain == "example.com"));
    }

    #[test]
    fn test_skips_anchors_and_pseudo_schemes() {
        let classifier = LinkClassifier::new();
        let links = classifier.classify(
            "https://example.com/",
            [
                "#top",
                "mailto:editor@example.com",
                "tel:+441234",
                "javascript:void(0)",
                "   ",
                "ftp://example.com/news/file",
            ],
        );
        assert!(links.is_empty());
    }

    #[test]
    fn test_fragment_removed_and_deduplicated() {
        let classifier = LinkClassifier::new();
        let links = classifier.classify(
            "https://example.com/news/",
            [
                "/news/story-1",
                "/news/story-1#comments",
                "https://example.com/news/story-1",
            ],
        );
        assert_eq!(urls(&links), vec!["https://example.com/news/story-1"]);
    }

    #[test]
    fn test_subdomain_is_a_different_domain() {
        let classifier = LinkClassifier::new();
        let links = classifier.classify(
            "https://example.com/",
            ["https://blog.example.com/news/2024/garage"],
        );
        assert!(links.is_empty());
    }

    #[test]
    fn test_www_prefix_is_normalized() {
        let classifier = LinkClassifier::new();
        let links = classifier.classify(
            "https://www.example.com/",
            ["https://example.com/news/garage-reopens"],
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links.iter().next().unwrap().origin_domain, "example.com");
    }

    #[test]
    fn test_depth_threshold_is_configurable() {
        let shallow = LinkClassifier::new().with_min_depth(1);
        assert!(shallow.looks_like_article("/news-roundup"));

        let strict = LinkClassifier::new().with_min_depth(3);
        assert!(!strict.looks_like_article("/news/garage-opens"));
        assert!(strict.looks_like_article("/news/2024/garage-opens"));
    }

    #[test]
    fn test_custom_keywords_replace_defaults() {
        let classifier = LinkClassifier::new()
            .with_keywords(["mot", "repairs"])
            .with_year_tokens(false);
        assert!(classifier.looks_like_article("/blog/mot-changes"));
        assert!(!classifier.looks_like_article("/news/garage-opens"));
        assert!(!classifier.looks_like_article("/blog/2024/update"));
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let classifier = LinkClassifier::new();
        assert!(classifier.looks_like_article("/Section/NEWS-Item"));
    }

    #[test]
    fn test_year_tokens() {
        assert!(has_year_token("/blog/2024/garage"));
        assert!(has_year_token("/blog/garage-1999-review"));
        assert!(!has_year_token("/blog/12345/garage"));
        assert!(!has_year_token("/blog/3024/garage"));
        assert!(!has_year_token("/blog/garage"));
    }

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth("/"), 0);
        assert_eq!(path_depth(""), 0);
        assert_eq!(path_depth("/news/"), 1);
        assert_eq!(path_depth("/news//story"), 2);
    }

    #[test]
    fn test_classify_page_harvests_anchors() {
        let html = r##"<html><body>
            <a href="/news/story-1">Story 1</a>
            <a href="/about">About</a>
            <a href="https://other.com/news/story-2">Offsite</a>
            <a href="#skip">Skip</a>
            <a href="/article/2024/feature">Feature</a>
        </body></html>"##;

        let links = LinkClassifier::new().classify_page("https://example.com/listing", html);
        assert_eq!(
            urls(&links),
            vec![
                "https://example.com/article/2024/feature",
                "https://example.com/news/story-1",
            ]
        );
    }

    #[test]
    fn test_invalid_listing_url_yields_nothing() {
        let links = LinkClassifier::new().classify("not a url", ["/news/a/b"]);
        assert!(links.is_empty());
    }

    #[test]
    fn test_site_domain() {
        assert_eq!(
            site_domain("https://WWW.Garage-News.co.uk/a"),
            Some("garage-news.co.uk".to_string())
        );
        assert_eq!(site_domain("not a url"), None);
    }
}

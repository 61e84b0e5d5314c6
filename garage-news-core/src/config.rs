use crate::error::{CoreError, Result};
use crate::model::{Source, SourceKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use garage_news_scanner::{ClassifierSettings, ExtractorSettings, FetchConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_DATABASE_PATH: &str = "garage_news.db";
pub const DEFAULT_CONFIG_PATH: &str = "config/sources.yaml";

/// Path suffixes that mark a plain-text entry as a feed rather than a listing page.
const FEED_SUFFIXES: &[&str] = &[".xml", ".rss", "/rss", "/feed", "/atom"];

/// Top-level YAML configuration. Every section is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: Vec<Source>,
    pub database_path: PathBuf,
    pub classifier: ClassifierSettings,
    pub extractor: ExtractorSettings,
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            classifier: ClassifierSettings::default(),
            extractor: ExtractorSettings::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn with_sources(sources: Vec<Source>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Load and validate a YAML config file.
///
/// Source URLs are checked here so a bad entry aborts before anything is fetched.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(CoreError::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let mut config: AppConfig = if content.trim().is_empty() {
        AppConfig::default()
    } else {
        serde_yaml::from_str(&content)?
    };

    config.sources = normalize_sources(config.sources)?;
    config.database_path = expand_path(&config.database_path.to_string_lossy());
    debug!(
        "Loaded {} sources from {}",
        config.sources.len(),
        path.display()
    );

    Ok(config)
}

/// Load sources from either a YAML config (`.yaml`/`.yml`) or a plain-text URL list.
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let sources = if is_yaml_path(path) {
        load_config(path)?.sources
    } else {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound(path.to_path_buf()));
        }
        parse_source_list(&fs::read_to_string(path)?)?
    };

    if sources.is_empty() {
        return Err(CoreError::InvalidConfig(format!(
            "no sources found in {}",
            path.display()
        )));
    }

    Ok(sources)
}

/// True for `.yaml`/`.yml` paths, which hold a full config rather than a URL list.
pub fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

/// Write a config back out as YAML, creating parent directories.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut config = config.clone();
    for source in &mut config.sources {
        // An empty category is dropped rather than written as ''
        if source.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
            source.category = None;
        }
    }

    fs::write(path, serde_yaml::to_string(&config)?)?;
    Ok(())
}

/// Parse a plain-text source list: one URL per line, `#` comments allowed.
pub fn parse_source_list(text: &str) -> Result<Vec<Source>> {
    let sources = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let url = with_default_scheme(line);
            let kind = if looks_like_feed(&url) {
                SourceKind::Feed
            } else {
                SourceKind::ListingPage
            };
            Source::new(String::new(), url, kind)
        })
        .collect();

    normalize_sources(sources)
}

/// Validate URLs, fill in missing names and collapse duplicate seed URLs.
fn normalize_sources(sources: Vec<Source>) -> Result<Vec<Source>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(sources.len());

    for mut source in sources {
        source.seed_url = source.seed_url.trim().to_string();
        validate_source_url(&source.seed_url)?;

        if !seen.insert(source.seed_url.clone()) {
            warn!(url = %source.seed_url, "Duplicate source URL, keeping the first entry");
            continue;
        }

        if source.display_name.trim().is_empty() {
            source.display_name = derive_name(&source.seed_url);
        }
        normalized.push(source);
    }

    Ok(normalized)
}

pub fn validate_source_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| CoreError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

fn with_default_scheme(raw: &str) -> String {
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

fn looks_like_feed(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().trim_end_matches('/').to_lowercase())
        .unwrap_or_default();
    FEED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Split user input on commas and newlines into URLs, adding `https://`
/// where the scheme is missing. Entries without a host are dropped.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split(['\n', '\r', ','])
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| {
            let url = with_default_scheme(chunk);
            match Url::parse(&url) {
                Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
                _ => {
                    warn!("Ignoring invalid URL: {}", chunk);
                    None
                }
            }
        })
        .collect()
}

/// Human-friendly name from a URL's host: `best-garages.co.uk` → `Best Garages`.
pub fn derive_name(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| url.to_lowercase());
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let Some(first_label) = host.split('.').find(|part| !part.is_empty()) else {
        return url.to_string();
    };

    let words: Vec<String> = first_label
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .take(3)
        .map(capitalize)
        .collect();

    if words.is_empty() {
        url.to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Parse a user-supplied date: RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS`
/// (taken as UTC) or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            CoreError::InvalidConfig(format!(
                "invalid date '{}': use RFC 3339 or YYYY-MM-DD",
                raw
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_name() {
        assert_eq!(derive_name("https://best-garages.co.uk/news"), "Best Garages");
        assert_eq!(derive_name("https://www.motortrade_weekly.com"), "Motortrade Weekly");
        assert_eq!(derive_name("https://one-two-three-four.com"), "One Two Three");
    }

    #[test]
    fn test_parse_url_list() {
        let urls = parse_url_list("example.com, https://garage.news/feed\n\n  http://x.org ,");
        assert_eq!(
            urls,
            vec![
                "https://example.com",
                "https://garage.news/feed",
                "http://x.org",
            ]
        );
    }

    #[test]
    fn test_looks_like_feed() {
        assert!(looks_like_feed("https://example.com/feed"));
        assert!(looks_like_feed("https://example.com/feed/"));
        assert!(looks_like_feed("https://example.com/news.xml"));
        assert!(looks_like_feed("https://example.com/blog/atom"));
        assert!(!looks_like_feed("https://example.com/news/"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-01-31").unwrap().to_rfc3339(),
            "2025-01-31T00:00:00+00:00"
        );
        assert_eq!(
            parse_date("2025-01-31T10:00:00+02:00").unwrap().to_rfc3339(),
            "2025-01-31T08:00:00+00:00"
        );
        assert!(parse_date("31/01/2025").is_err());
    }
}

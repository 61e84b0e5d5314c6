// Tests for source configuration loading

use garage_news_core::config::{
    AppConfig, DEFAULT_DATABASE_PATH, load_config, load_sources, parse_source_list, save_config,
};
use garage_news_core::error::CoreError;
use garage_news_core::model::{Source, SourceKind};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// YAML Config Tests
// ============================================================================

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "sources.yaml",
        r#"
database_path: data/news.db
sources:
  - name: Garage Wire
    url: https://garagewire.example.com/news/
    type: website
    category: trade
    polling_interval_minutes: 60
    tags: [uk, independents]
  - name: Parts Feed
    url: https://parts.example.org/feed
    type: rss
classifier:
  keywords: [news, blog]
  min_depth: 3
extractor:
  min_paragraph_length: 20
fetch:
  timeout_secs: 5
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.database_path, PathBuf::from("data/news.db"));
    assert_eq!(config.sources.len(), 2);

    let wire = &config.sources[0];
    assert_eq!(wire.display_name, "Garage Wire");
    assert_eq!(wire.kind, SourceKind::ListingPage);
    assert_eq!(wire.category.as_deref(), Some("trade"));
    assert_eq!(wire.poll_interval_minutes, 60);
    assert!(wire.tags.contains("uk"));

    assert_eq!(config.sources[1].kind, SourceKind::Feed);
    assert_eq!(config.sources[1].poll_interval_minutes, 360);

    assert_eq!(config.classifier.keywords, vec!["news", "blog"]);
    assert_eq!(config.classifier.min_depth, 3);
    assert_eq!(config.extractor.min_paragraph_length, 20);
    assert_eq!(config.fetch.timeout_secs, 5);
}

#[test]
fn test_load_minimal_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "sources.yaml",
        "sources:\n  - url: https://www.best-garages.co.uk/news\n",
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
    assert_eq!(config.sources[0].display_name, "Best Garages");
    assert_eq!(config.sources[0].kind, SourceKind::Feed);
    assert_eq!(config.classifier, AppConfig::default().classifier);
}

#[test]
fn test_empty_config_file_is_default() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sources.yaml", "   \n");

    let config = load_config(&path).unwrap();
    assert!(config.sources.is_empty());
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let result = load_config(&dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(CoreError::ConfigNotFound(_))));
}

#[test]
fn test_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sources.yaml", "sources: [unclosed\n");
    assert!(matches!(load_config(&path), Err(CoreError::Yaml(_))));
}

#[test]
fn test_unknown_source_type_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "sources.yaml",
        "sources:\n  - url: https://a.com\n    type: podcast\n",
    );
    assert!(matches!(load_config(&path), Err(CoreError::Yaml(_))));
}

#[test]
fn test_invalid_source_url_aborts() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "sources.yaml",
        "sources:\n  - url: https://ok.example.com\n  - url: ftp://files.example.com\n",
    );

    match load_config(&path) {
        Err(CoreError::InvalidUrl { url, .. }) => assert_eq!(url, "ftp://files.example.com"),
        other => panic!("expected InvalidUrl, got {:?}", other),
    }
}

#[test]
fn test_duplicate_sources_collapsed() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "sources.yaml",
        "sources:\n  - name: First\n    url: https://a.com/news\n  - name: Second\n    url: https://a.com/news\n",
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.sources[0].display_name, "First");
}

// ============================================================================
// Source List Tests
// ============================================================================

#[test]
fn test_parse_plain_text_source_list() {
    let sources = parse_source_list(
        "# trade press\nhttps://garagewire.example.com/news/\n\nparts.example.org/rss\n  https://blog.example.net/feed.xml  \n",
    )
    .unwrap();

    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0].kind, SourceKind::ListingPage);
    assert_eq!(sources[1].seed_url, "https://parts.example.org/rss");
    assert_eq!(sources[1].kind, SourceKind::Feed);
    assert_eq!(sources[2].kind, SourceKind::Feed);
    assert_eq!(sources[2].display_name, "Blog");
}

#[test]
fn test_load_sources_dispatches_on_extension() {
    let dir = TempDir::new().unwrap();
    let yaml = write_file(&dir, "sources.yml", "sources:\n  - url: https://a.com/feed\n");
    let text = write_file(&dir, "sources.txt", "https://b.com/news/\n");

    assert_eq!(load_sources(&yaml).unwrap()[0].seed_url, "https://a.com/feed");
    let listed = load_sources(&text).unwrap();
    assert_eq!(listed[0].kind, SourceKind::ListingPage);
}

#[test]
fn test_load_sources_empty_is_error() {
    let dir = TempDir::new().unwrap();
    let text = write_file(&dir, "sources.txt", "# nothing here\n\n");
    assert!(matches!(load_sources(&text), Err(CoreError::InvalidConfig(_))));
}

// ============================================================================
// Save Tests
// ============================================================================

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/config/sources.yaml");

    let mut listing = Source::listing("Garage Wire", "https://garagewire.example.com/news/");
    listing.category = Some("  ".to_string());
    listing.tags.insert("uk".to_string());
    let config = AppConfig::with_sources(vec![
        listing,
        Source::feed("Parts Feed", "https://parts.example.org/feed"),
    ]);

    save_config(&config, &path).unwrap();
    let written = fs::read_to_string(&path).unwrap();
    assert!(!written.contains("category"));
    assert!(written.contains("type: website"));

    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.sources.len(), 2);
    assert_eq!(loaded.sources[0].category, None);
    assert!(loaded.sources[0].tags.contains("uk"));
    assert_eq!(loaded.sources[1].kind, SourceKind::Feed);
}

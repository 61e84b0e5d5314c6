// Tests for CSV export

use chrono::{TimeZone, Utc};
use garage_news_core::export::{CsvSink, export_csv};
use garage_news_core::model::Article;
use garage_news_core::sink::RecordSink;
use std::fs;
use tempfile::TempDir;

fn fixed_article(url: &str, headline: &str, content: &str) -> Article {
    let ts = Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap();
    Article::with_timestamp(url, headline, content, ts)
}

// ============================================================================
// export_csv Tests
// ============================================================================

#[test]
fn test_export_writes_bom_header_and_rows() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("articles.csv");

    let articles = vec![
        fixed_article("https://www.garage.example/news/1", "Plain headline", "Body"),
        fixed_article(
            "https://garage.example/news/2",
            "Brakes, tyres and \"more\"",
            "Line one\n\nLine two",
        ),
    ];

    let rows = export_csv(&articles, &path).unwrap();
    assert_eq!(rows, 2);

    let written = fs::read_to_string(&path).unwrap();
    let expected = "\u{FEFF}website,article_url,headline,content,scraped_at\r\n\
garage.example,https://www.garage.example/news/1,Plain headline,Body,2024-07-01T09:30:00.000000Z\r\n\
garage.example,https://garage.example/news/2,\"Brakes, tyres and \"\"more\"\"\",\"Line one\n\nLine two\",2024-07-01T09:30:00.000000Z\r\n";
    assert_eq!(written, expected);
}

#[test]
fn test_export_empty_still_has_header() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("reports/empty.csv");

    let rows = export_csv(&Vec::<Article>::new(), &path).unwrap();
    assert_eq!(rows, 0);

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "\u{FEFF}website,article_url,headline,content,scraped_at\r\n"
    );
}

// ============================================================================
// CsvSink Tests
// ============================================================================

#[test]
fn test_sink_rewrites_file_each_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("articles.csv");

    let mut first = CsvSink::new(&path);
    first.upsert(&fixed_article("https://a.com/news/1", "One", "")).unwrap();
    first.upsert(&fixed_article("https://a.com/news/2", "Two", "")).unwrap();
    first.finish().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);

    let mut second = CsvSink::new(&path);
    second.upsert(&fixed_article("https://a.com/news/3", "Three", "")).unwrap();
    second.finish().unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(written.lines().count(), 2);
    assert!(written.contains("Three"));
    assert!(!written.contains("One"));
}

#[test]
fn test_sink_has_no_run_ledger() {
    let temp_dir = TempDir::new().unwrap();
    let mut sink = CsvSink::new(temp_dir.path().join("articles.csv"));
    assert!(sink.begin_run(&["https://a.com".to_string()]).unwrap().is_none());
}

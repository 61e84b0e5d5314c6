use crate::error::Result;
use crate::model::{Article, format_timestamp};
use crate::sink::{RecordSink, UpsertOutcome};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CSV_HEADER: [&str; 5] = ["website", "article_url", "headline", "content", "scraped_at"];
const BOM: &str = "\u{FEFF}";

/// Quote a field when it holds a delimiter, quote or line break (RFC 4180).
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

/// Write articles to `path` as UTF-8 CSV with a byte-order mark.
/// Returns the number of rows written.
pub fn export_csv<'a, I>(articles: I, path: &Path) -> Result<usize>
where
    I: IntoIterator<Item = &'a Article>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(BOM.as_bytes())?;
    writer.write_all(csv_row(&CSV_HEADER).as_bytes())?;

    let mut count = 0;
    for article in articles {
        let scraped_at = format_timestamp(&article.scraped_at);
        let row = csv_row(&[
            article.website.as_str(),
            article.article_url.as_str(),
            article.headline.as_str(),
            article.content.as_str(),
            scraped_at.as_str(),
        ]);
        writer.write_all(row.as_bytes())?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Record sink that buffers a run's articles and writes them as CSV on `finish`.
///
/// The file is rewritten on every run. Rows keep first-seen order and a
/// repeated URL replaces its earlier row in place.
pub struct CsvSink {
    path: PathBuf,
    articles: Vec<Article>,
    index: HashMap<String, usize>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            articles: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }
}

impl RecordSink for CsvSink {
    fn upsert(&mut self, article: &Article) -> Result<UpsertOutcome> {
        match self.index.get(&article.article_url) {
            Some(&pos) => {
                self.articles[pos] = article.clone();
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.index
                    .insert(article.article_url.clone(), self.articles.len());
                self.articles.push(article.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        let rows = export_csv(&self.articles, &self.path)?;
        info!("Wrote {} rows to {}", rows, self.path.display());
        Ok(())
    }
}

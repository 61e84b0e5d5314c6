use crate::model::{Article, format_timestamp, parse_stored_timestamp};
use crate::sink::{RecordSink, RunStatus, UpsertOutcome};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

const ARTICLE_COLUMNS: &str = "website, article_url, headline, content, scraped_at";

pub struct Database {
    conn: Connection,
}

/// One row of the run ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub sources: Vec<String>,
}

fn now() -> String {
    format_timestamp(&Utc::now())
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_stored_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{}'", raw).into(),
        )
    })
}

fn article_from_row(row: &Row<'_>) -> Result<Article> {
    Ok(Article {
        website: row.get(0)?,
        article_url: row.get(1)?,
        headline: row.get(2)?,
        content: row.get(3)?,
        scraped_at: timestamp_column(row, 4)?,
    })
}

fn run_from_row(row: &Row<'_>) -> Result<RunRecord> {
    let finished_at: Option<String> = row.get(2)?;
    let sources: String = row.get(4)?;
    let sources = serde_json::from_str(&sources).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: timestamp_column(row, 1)?,
        finished_at: finished_at.as_deref().and_then(parse_stored_timestamp),
        status: row.get(3)?,
        sources,
    })
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    website TEXT NOT NULL,
    article_url TEXT NOT NULL UNIQUE,
    headline TEXT NOT NULL,
    content TEXT NOT NULL,
    scraped_at TEXT NOT NULL      -- RFC 3339 UTC, microseconds
);

CREATE INDEX IF NOT EXISTS idx_articles_website ON articles(website);
CREATE INDEX IF NOT EXISTS idx_articles_scraped_at ON articles(scraped_at);

-- Pipeline runs
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    sources TEXT NOT NULL         -- JSON array of seed URLs
);

CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            ",
        )?;
        Ok(())
    }

    // Article operations
    pub fn upsert_article(&self, article: &Article) -> Result<UpsertOutcome> {
        let existed = self.get_article(&article.article_url)?.is_some();

        self.conn.execute(
            "INSERT INTO articles (website, article_url, headline, content, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(article_url) DO UPDATE SET
                website = excluded.website,
                headline = excluded.headline,
                content = excluded.content,
                scraped_at = excluded.scraped_at",
            params![
                &article.website,
                &article.article_url,
                &article.headline,
                &article.content,
                format_timestamp(&article.scraped_at),
            ],
        )?;

        debug!(url = %article.article_url, updated = existed, "Stored article");
        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    pub fn get_article(&self, article_url: &str) -> Result<Option<Article>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM articles WHERE article_url = ?1",
            ARTICLE_COLUMNS
        ))?;

        stmt.query_row(params![article_url], article_from_row)
            .optional()
    }

    pub fn article_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Newest first.
    pub fn recent_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.articles_between(None, None, Some(limit))
    }

    pub fn all_articles(&self) -> Result<Vec<Article>> {
        self.articles_between(None, None, None)
    }

    /// Articles scraped within `[start, end]`, newest first. Either bound may be open.
    pub fn articles_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<Article>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(start) = start {
            values.push(format_timestamp(&start));
            clauses.push(format!("scraped_at >= ?{}", values.len()));
        }
        if let Some(end) = end {
            values.push(format_timestamp(&end));
            clauses.push(format!("scraped_at <= ?{}", values.len()));
        }

        let mut query = format!("SELECT {} FROM articles", ARTICLE_COLUMNS);
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY scraped_at DESC, id DESC");
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&query)?;
        let articles = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), article_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(articles)
    }

    pub fn articles_since(&self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        self.articles_between(Some(since), None, None)
    }

    /// Articles scraped since the most recent completed run started.
    ///
    /// With no completed run on record this is every article.
    pub fn articles_since_last_run(&self) -> Result<Vec<Article>> {
        match self.last_completed_run()? {
            Some(run) => self.articles_since(run.started_at),
            None => self.all_articles(),
        }
    }

    // Run ledger
    pub fn create_run(&self, seed_urls: &[String]) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let sources = serde_json::to_string(seed_urls)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        self.conn.execute(
            "INSERT INTO runs (id, started_at, status, sources) VALUES (?1, ?2, ?3, ?4)",
            params![&run_id, now(), RunStatus::Running.as_str(), sources],
        )?;

        Ok(run_id)
    }

    pub fn complete_run(&self, run_id: &str) -> Result<()> {
        self.finish_run(run_id, RunStatus::Completed)
    }

    pub fn fail_run(&self, run_id: &str) -> Result<()> {
        self.finish_run(run_id, RunStatus::Failed)
    }

    fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.as_str(), now(), run_id],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, status, sources FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()
    }

    pub fn last_completed_run(&self) -> Result<Option<RunRecord>> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, status, sources FROM runs
                 WHERE status = 'completed'
                 ORDER BY started_at DESC
                 LIMIT 1",
                [],
                run_from_row,
            )
            .optional()
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordSink for Database {
    fn upsert(&mut self, article: &Article) -> crate::error::Result<UpsertOutcome> {
        Ok(self.upsert_article(article)?)
    }

    fn begin_run(&mut self, seed_urls: &[String]) -> crate::error::Result<Option<String>> {
        Ok(Some(self.create_run(seed_urls)?))
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> crate::error::Result<()> {
        Ok(self.finish_run(run_id, status)?)
    }
}

use crate::error::Result;
use crate::model::Article;
use serde::{Deserialize, Serialize};

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Destination for scraped articles, keyed on `article_url`.
///
/// Writing the same URL twice replaces the earlier record; it is never an error.
pub trait RecordSink {
    fn upsert(&mut self, article: &Article) -> Result<UpsertOutcome>;

    /// Flush anything buffered. Called once after the last upsert of a run.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Hook for sinks that keep a run ledger. Returns the run id, if any.
    fn begin_run(&mut self, _seed_urls: &[String]) -> Result<Option<String>> {
        Ok(None)
    }

    fn end_run(&mut self, _run_id: &str, _status: RunStatus) -> Result<()> {
        Ok(())
    }
}

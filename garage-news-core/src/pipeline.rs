use crate::config::AppConfig;
use crate::dedup::Deduplicator;
use crate::error::Result;
use crate::model::{Article, Source, SourceKind};
use crate::sink::{RecordSink, RunStatus};
use chrono::{DateTime, Utc};
use garage_news_scanner::classifier::site_domain;
use garage_news_scanner::{
    CandidateLink, ContentExtractor, FetchFailure, Fetcher, LinkClassifier, parse_feed,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for a single pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Cap on articles processed per source, applied after deduplication
    pub limit_per_source: Option<usize>,
    /// Store link metadata only, without fetching article pages
    pub skip_full_content: bool,
    pub show_progress: bool,
}

/// Where a source ended up in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Pending,
    ListingFetched,
    LinksClassified,
    Done,
    Skipped,
}

impl SourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceState::Pending => "pending",
            SourceState::ListingFetched => "listing_fetched",
            SourceState::LinksClassified => "links_classified",
            SourceState::Done => "done",
            SourceState::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Fetch(FetchFailure),
    Sink(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Fetch(failure) => write!(f, "{}", failure),
            SkipReason::Sink(err) => write!(f, "sink write failed: {}", err),
        }
    }
}

/// Result of handling one article link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Stored(Article),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLink {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub seed_url: String,
    pub kind: SourceKind,
    pub state: SourceState,
    pub links_discovered: usize,
    pub duplicates: usize,
    pub over_limit: usize,
    pub stored: usize,
    pub skipped: Vec<SkippedLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl SourceReport {
    fn new(source: &Source) -> Self {
        Self {
            name: source.display_name.clone(),
            seed_url: source.seed_url.clone(),
            kind: source.kind,
            state: SourceState::Pending,
            links_discovered: 0,
            duplicates: 0,
            over_limit: 0,
            stored: 0,
            skipped: Vec::new(),
            failure: None,
        }
    }

    fn skip(mut self, failure: FetchFailure) -> Self {
        warn!(source = %self.seed_url, reason = %failure, "Skipping source");
        self.state = SourceState::Skipped;
        self.failure = Some(failure.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    pub fn total_stored(&self) -> usize {
        self.sources.iter().map(|s| s.stored).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.sources.iter().map(|s| s.skipped.len()).sum()
    }

    pub fn total_discovered(&self) -> usize {
        self.sources.iter().map(|s| s.links_discovered).sum()
    }

    pub fn skipped_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.state == SourceState::Skipped)
            .count()
    }
}

/// An article link plus whatever the listing told us about it.
#[derive(Debug, Clone)]
struct DiscoveredLink {
    url: String,
    title: Option<String>,
}

/// Sequential listing → classify → dedupe → fetch → extract → store driver.
///
/// One request is in flight at a time. A failing link or source is recorded
/// in the run summary and never aborts the rest of the run.
pub struct Pipeline {
    fetcher: Fetcher,
    classifier: LinkClassifier,
    extractor: ContentExtractor,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self::from_parts(
            Fetcher::from_config(&config.fetch)?,
            LinkClassifier::from_settings(&config.classifier),
            ContentExtractor::from_settings(&config.extractor),
        ))
    }

    pub fn from_parts(
        fetcher: Fetcher,
        classifier: LinkClassifier,
        extractor: ContentExtractor,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            extractor,
        }
    }

    pub async fn run<S>(
        &self,
        sources: &[Source],
        sink: &mut S,
        options: &RunOptions,
    ) -> Result<RunSummary>
    where
        S: RecordSink + ?Sized,
    {
        let started_at = Utc::now();
        let seeds: Vec<String> = sources.iter().map(|s| s.seed_url.clone()).collect();
        let run_id = sink.begin_run(&seeds)?;
        info!(sources = sources.len(), "Starting run");

        let progress = options.show_progress.then(new_spinner);
        let mut dedup = Deduplicator::new();
        let mut reports = Vec::with_capacity(sources.len());

        for (idx, source) in sources.iter().enumerate() {
            if let Some(ref pb) = progress {
                pb.set_message(format!(
                    "[{}/{}] {}",
                    idx + 1,
                    sources.len(),
                    source.display_name
                ));
            }

            let report = self
                .process_source(source, sink, &mut dedup, options, progress.as_ref())
                .await;
            info!(
                source = %source.seed_url,
                state = report.state.as_str(),
                stored = report.stored,
                skipped = report.skipped.len(),
                "Source finished"
            );
            reports.push(report);
        }

        let finished = sink.finish();
        let status = if finished.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        if let Some(ref id) = run_id {
            sink.end_run(id, status)?;
        }
        finished?;

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            sources: reports,
        };

        if let Some(pb) = progress {
            pb.finish_with_message(format!(
                "Run complete! {} articles stored, {} skipped",
                summary.total_stored(),
                summary.total_skipped()
            ));
        }

        Ok(summary)
    }

    async fn process_source<S>(
        &self,
        source: &Source,
        sink: &mut S,
        dedup: &mut Deduplicator,
        options: &RunOptions,
        progress: Option<&ProgressBar>,
    ) -> SourceReport
    where
        S: RecordSink + ?Sized,
    {
        let mut report = SourceReport::new(source);

        let body = match self.fetch_listing(source).await {
            Ok(body) => body,
            Err(failure) => return report.skip(failure),
        };
        report.state = SourceState::ListingFetched;

        let links = match self.links_from_listing(source, &body) {
            Ok(links) => links,
            Err(failure) => return report.skip(failure),
        };
        report.state = SourceState::LinksClassified;
        report.links_discovered = links.len();
        debug!(source = %source.seed_url, links = links.len(), "Links classified");

        let cap = options.limit_per_source.unwrap_or(usize::MAX);
        let mut selected = Vec::new();
        for link in links {
            if dedup.seen(&link.url) {
                report.duplicates += 1;
            } else if selected.len() >= cap {
                report.over_limit += 1;
            } else {
                dedup.mark(&link.url);
                selected.push(link);
            }
        }

        for link in &selected {
            if let Some(pb) = progress {
                pb.set_message(format!("{}: {}", source.display_name, link.url));
                pb.tick();
            }

            match self.process_link(link, sink, options).await {
                LinkOutcome::Stored(_) => report.stored += 1,
                LinkOutcome::Skipped(reason) => {
                    warn!(url = %link.url, reason = %reason, "Skipping article");
                    report.skipped.push(SkippedLink {
                        url: link.url.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        report.state = SourceState::Done;
        report
    }

    async fn process_link<S>(
        &self,
        link: &DiscoveredLink,
        sink: &mut S,
        options: &RunOptions,
    ) -> LinkOutcome
    where
        S: RecordSink + ?Sized,
    {
        let fallback_title = link.title.clone().unwrap_or_default();

        let article = if options.skip_full_content {
            Article::new(&link.url, fallback_title, "")
        } else {
            let html = match self.fetcher.fetch_html(&link.url).await {
                Ok(html) => html,
                Err(failure) => return LinkOutcome::Skipped(SkipReason::Fetch(failure)),
            };

            let extracted = self.extractor.extract(&html);
            let headline = if extracted.headline.is_empty() {
                fallback_title
            } else {
                extracted.headline
            };
            Article::new(&link.url, headline, extracted.body)
        };

        match sink.upsert(&article) {
            Ok(_) => LinkOutcome::Stored(article),
            Err(e) => LinkOutcome::Skipped(SkipReason::Sink(e.to_string())),
        }
    }

    async fn fetch_listing(&self, source: &Source) -> std::result::Result<String, FetchFailure> {
        match source.kind {
            SourceKind::ListingPage => self.fetcher.fetch_html(&source.seed_url).await,
            SourceKind::Feed => self.fetcher.fetch_feed(&source.seed_url).await,
        }
    }

    fn links_from_listing(
        &self,
        source: &Source,
        body: &str,
    ) -> std::result::Result<Vec<DiscoveredLink>, FetchFailure> {
        match source.kind {
            SourceKind::ListingPage => Ok(self
                .classifier
                .classify_page(&source.seed_url, body)
                .into_iter()
                .map(|link| DiscoveredLink {
                    url: link.absolute_url,
                    title: None,
                })
                .collect()),
            SourceKind::Feed => Ok(parse_feed(&source.seed_url, body)?
                .into_iter()
                .map(|entry| DiscoveredLink {
                    url: entry.link,
                    title: Some(entry.title),
                })
                .collect()),
        }
    }

    /// Candidate article links for each source without fetching any article.
    ///
    /// `limit` caps links per source. Sources that fail are logged and left out.
    pub async fn preview_links(
        &self,
        sources: &[Source],
        limit: Option<usize>,
    ) -> Vec<CandidateLink> {
        let mut dedup = Deduplicator::new();
        let mut candidates = Vec::new();

        for source in sources {
            let links = match self.fetch_listing(source).await.and_then(|body| {
                self.links_from_listing(source, &body)
            }) {
                Ok(links) => links,
                Err(failure) => {
                    warn!(source = %source.seed_url, reason = %failure, "Preview failed");
                    continue;
                }
            };

            candidates.extend(
                links
                    .into_iter()
                    .filter(|link| dedup.first_sighting(&link.url))
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|link| {
                        let domain = site_domain(&link.url).unwrap_or_default();
                        CandidateLink::new(link.url, domain)
                    }),
            );
        }

        candidates
    }
}

fn new_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Starting run...");
    pb
}

// Report rendering for runs, insights and stored articles

use crate::analysis::{Insights, Trend};
use crate::model::{Article, Source, format_timestamp};
use crate::pipeline::{RunSummary, SourceState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(HEAVY_RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(HEAVY_RULE);
    report.push('\n');
}

fn format_time(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn generate_run_report(summary: &RunSummary) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                           GARAGE NEWS RUN SUMMARY\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    if let Some(ref id) = summary.run_id {
        report.push_str(&format!("Run ID:       {}\n", id));
    }
    report.push_str(&format!("Status:       {}\n", summary.status.as_str()));
    report.push_str(&format!("Started:      {}\n", format_time(&summary.started_at)));
    let elapsed = summary.finished_at - summary.started_at;
    report.push_str(&format!(
        "Duration:     {:.1} seconds\n",
        elapsed.num_milliseconds() as f64 / 1000.0
    ));
    report.push_str(&format!("Sources:      {}\n", summary.sources.len()));
    report.push_str(&format!("Discovered:   {}\n", summary.total_discovered()));
    report.push_str(&format!("Stored:       {}\n", summary.total_stored()));
    report.push_str(&format!("Skipped:      {}\n\n", summary.total_skipped()));

    if summary.sources.is_empty() {
        return report;
    }

    section(&mut report, "SOURCES");

    for (idx, source) in summary.sources.iter().enumerate() {
        report.push_str(&format!("[{}] {} ({})\n", idx + 1, source.name, source.kind));
        report.push_str(&format!("URL:          {}\n", source.seed_url));
        report.push_str(&format!("State:        {}\n", source.state.as_str()));

        if source.state == SourceState::Skipped {
            if let Some(ref failure) = source.failure {
                report.push_str(&format!("Reason:       {}\n", failure));
            }
        } else {
            report.push_str(&format!(
                "Links:        {} discovered, {} duplicate, {} over limit\n",
                source.links_discovered, source.duplicates, source.over_limit
            ));
            report.push_str(&format!("Stored:       {}\n", source.stored));
        }

        if !source.skipped.is_empty() {
            report.push_str("Skipped links:\n");
            for link in &source.skipped {
                report.push_str(&format!("  - {} ({})\n", link.url, link.reason));
            }
        }

        report.push('\n');
        report.push_str(LIGHT_RULE);
        report.push('\n');
    }

    report
}

pub fn generate_insights_text(insights: &Insights, article_count: usize) -> String {
    let mut report = String::new();

    section(&mut report, "SUMMARY");
    if insights.summary.is_empty() {
        report.push_str("  (no articles)\n\n");
    } else {
        for line in insights.summary.lines() {
            report.push_str(&wrap_text(line, 80, "  "));
        }
        report.push('\n');
    }

    section(&mut report, "TRENDS");
    report.push_str(&format!("Articles analysed: {}\n\n", article_count));
    report.push_str(&format_trends(&insights.trends));
    report.push('\n');

    if !insights.suggestions.is_empty() {
        section(&mut report, "POLICY SUGGESTIONS");
        for suggestion in &insights.suggestions {
            report.push_str(&wrap_text(suggestion, 80, "  "));
        }
        report.push('\n');
    }

    report
}

fn format_trends(trends: &[Trend]) -> String {
    if trends.is_empty() {
        return "  (none)\n".to_string();
    }

    let width = trends.iter().map(|t| t.keyword.len()).max().unwrap_or(0);
    trends
        .iter()
        .map(|t| format!("  {:<width$}  {}\n", t.keyword, t.frequency, width = width))
        .collect()
}

pub fn generate_insights_json(
    insights: &Insights,
    article_count: usize,
    by_website: Option<&BTreeMap<String, Vec<Trend>>>,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "metadata": {
            "generator": "garage-news",
            "version": env!("CARGO_PKG_VERSION"),
            "generated_at": format_timestamp(&chrono::Utc::now()),
            "article_count": article_count,
        },
        "summary": insights.summary,
        "trends": insights.trends,
        "suggestions": insights.suggestions,
        "trends_by_website": by_website,
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_website_trends_text(by_website: &BTreeMap<String, Vec<Trend>>) -> String {
    let mut report = String::new();
    section(&mut report, "TRENDS BY WEBSITE");
    for (website, trends) in by_website {
        report.push_str(&format!("{}\n", website));
        report.push_str(&format_trends(trends));
        report.push('\n');
    }
    report
}

/// One line per article: timestamp, website, headline.
pub fn generate_article_table(articles: &[Article]) -> String {
    if articles.is_empty() {
        return "No articles stored yet.\n".to_string();
    }

    let site_width = articles
        .iter()
        .map(|a| a.website.len())
        .max()
        .unwrap_or(0)
        .max("WEBSITE".len());

    let mut table = format!(
        "{:<20}  {:<site_width$}  HEADLINE\n",
        "SCRAPED",
        "WEBSITE",
        site_width = site_width
    );
    for article in articles {
        let headline = if article.headline.is_empty() {
            article.article_url.as_str()
        } else {
            article.headline.as_str()
        };
        table.push_str(&format!(
            "{:<20}  {:<site_width$}  {}\n",
            article.scraped_at.format("%Y-%m-%d %H:%M:%S"),
            article.website,
            truncate(headline, 70),
            site_width = site_width
        ));
    }
    table
}

pub fn generate_source_table(sources: &[Source]) -> String {
    let mut table = String::new();
    for source in sources {
        table.push_str(&format!("{} [{}]\n", source.display_name, source.kind));
        table.push_str(&format!("  {}\n", source.seed_url));
        if let Some(ref category) = source.category {
            table.push_str(&format!("  category: {}\n", category));
        }
        if !source.tags.is_empty() {
            let tags: Vec<&str> = source.tags.iter().map(String::as_str).collect();
            table.push_str(&format!("  tags: {}\n", tags.join(", ")));
        }
        table.push_str(&format!(
            "  polling every {} minutes\n",
            source.poll_interval_minutes
        ));
    }
    table
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut)
}

pub fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();
    let available = width.saturating_sub(indent.len()).max(1);

    for word in text.split_whitespace() {
        if !current_line.is_empty()
            && current_line.chars().count() + word.chars().count() + 1 > available
        {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

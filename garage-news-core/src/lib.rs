pub mod analysis;
pub mod config;
pub mod data;
pub mod dedup;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod sink;

use colored::Colorize;

pub use analysis::{Insights, KeywordSummarizer, Summarizer, Trend};
pub use config::{AppConfig, load_config, load_sources};
pub use data::Database;
pub use dedup::Deduplicator;
pub use error::{CoreError, Result};
pub use export::{CsvSink, export_csv};
pub use model::{Article, Source, SourceKind};
pub use pipeline::{Pipeline, RunOptions, RunSummary, SourceReport, SourceState};
pub use sink::{RecordSink, RunStatus, UpsertOutcome};

const BANNER: &str = r#"
   ____                               _   _
  / ___| __ _ _ __ __ _  __ _  ___   | \ | | _____      _____
 | |  _ / _` | '__/ _` |/ _` |/ _ \  |  \| |/ _ \ \ /\ / / __|
 | |_| | (_| | | | (_| | (_| |  __/  | |\  |  __/\ V  V /\__ \
  \____|\__,_|_|  \__,_|\__, |\___|  |_| \_|\___| \_/\_/ |___/
                        |___/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_blue().bold());
    println!(
        "  {} {}",
        "news discovery for independent garages".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}

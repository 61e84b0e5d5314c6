use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use colored::Colorize;
use garage_news_core::analysis::{KeywordSummarizer, Summarizer, trends_by_website};
use garage_news_core::config::{
    AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_DATABASE_PATH, expand_path, is_yaml_path, load_config, load_sources,
    parse_date, parse_source_list, parse_url_list, save_config,
};
use garage_news_core::data::Database;
use garage_news_core::export::{CsvSink, export_csv};
use garage_news_core::model::{Source, SourceKind};
use garage_news_core::pipeline::{Pipeline, RunOptions};
use garage_news_core::report::{
    ReportFormat, generate_article_table, generate_insights_json, generate_insights_text,
    generate_run_report, generate_source_table, generate_website_trends_text, save_report,
};
use garage_news_scanner::{CandidateLink, Fetcher, discover_feeds};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

const SAMPLE_CONFIG: &str = include_str!("../config/sources.yaml");

pub type Result<T> = anyhow::Result<T>;

// Helpers shared by the handlers

/// Build the run configuration from a config path and optional `--url` overrides.
///
/// YAML files contribute their classifier/extractor/fetch settings even when
/// the source list is overridden on the command line.
pub fn load_run_config(config_path: &Path, urls: &[String]) -> Result<AppConfig> {
    let yaml = is_yaml_path(config_path);

    let mut config = if yaml && (urls.is_empty() || config_path.exists()) {
        load_config(config_path)?
    } else {
        AppConfig::default()
    };

    if !urls.is_empty() {
        config.sources = parse_source_list(&urls.join("\n"))?;
    } else if !yaml {
        config.sources = load_sources(config_path)?;
    }

    if config.sources.is_empty() {
        bail!("no sources configured in {}", config_path.display());
    }

    debug!(
        "Run config: {} sources, database {}",
        config.sources.len(),
        config.database_path.display()
    );
    Ok(config)
}

/// `--database` wins, then the config file's `database_path`, then the default.
pub fn resolve_database_path(database: Option<&str>, config_path: &Path) -> Result<PathBuf> {
    if let Some(path) = database {
        return Ok(expand_path(path));
    }
    if is_yaml_path(config_path) && config_path.exists() {
        return Ok(load_config(config_path)?.database_path);
    }
    Ok(PathBuf::from(DEFAULT_DATABASE_PATH))
}

pub fn parse_kind(raw: &str) -> Result<SourceKind> {
    raw.parse::<SourceKind>().map_err(|e| anyhow!(e))
}

/// Append new sources to `config`, skipping URLs it already holds.
/// Returns the sources that were added.
pub fn add_sources(
    config: &mut AppConfig,
    raw_urls: &[String],
    name: Option<&str>,
    kind: Option<SourceKind>,
    category: Option<&str>,
    tags: &[String],
) -> Result<Vec<Source>> {
    let joined = raw_urls
        .iter()
        .flat_map(|raw| raw.split_whitespace())
        .collect::<Vec<_>>()
        .join(",");
    let urls = parse_url_list(&joined);
    if urls.is_empty() {
        bail!("no valid URLs given");
    }

    let mut added = Vec::new();
    for url in &urls {
        let mut source = parse_source_list(url)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("invalid source URL: {}", url))?;

        if config.sources.iter().any(|s| s.seed_url == source.seed_url) {
            println!(
                "{} Already configured: {}",
                "→".yellow(),
                source.seed_url.bright_white()
            );
            continue;
        }

        if let Some(kind) = kind {
            source.kind = kind;
        }
        if let Some(name) = name.filter(|n| !n.trim().is_empty() && urls.len() == 1) {
            source.display_name = name.trim().to_string();
        }
        source.category = category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        source.tags = tags.iter().map(|t| t.trim().to_string()).collect();

        config.sources.push(source.clone());
        added.push(source);
    }

    Ok(added)
}

/// Group candidate links under their domain, in discovery order.
pub fn format_candidate_links(links: &[CandidateLink]) -> String {
    let mut out = String::new();
    let mut current_domain: Option<&str> = None;

    for link in links {
        if current_domain != Some(link.origin_domain.as_str()) {
            if current_domain.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("{}\n", link.origin_domain));
            current_domain = Some(link.origin_domain.as_str());
        }
        out.push_str(&format!("  → {}\n", link.absolute_url));
    }

    out.push_str(&format!("\n{} candidate links\n", links.len()));
    out
}

fn config_path(args: &ArgMatches) -> PathBuf {
    args.get_one::<String>("config")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn open_existing_database(args: &ArgMatches) -> Result<Database> {
    let path = resolve_database_path(
        args.get_one::<String>("database").map(String::as_str),
        &config_path(args),
    )?;
    if !Database::exists(&path) {
        bail!(
            "no database at {} (run `garage-news run` first)",
            path.display()
        );
    }
    Database::new(&path).with_context(|| format!("opening database {}", path.display()))
}

fn date_bound(args: &ArgMatches, id: &str) -> Result<Option<DateTime<Utc>>> {
    args.get_one::<String>(id)
        .map(|raw| parse_date(raw).map_err(anyhow::Error::from))
        .transpose()
}

/// Print `content`, or save it when `--output` was given.
fn emit(content: &str, output: Option<&String>) -> Result<()> {
    match output {
        Some(path) => {
            let path = expand_path(path);
            save_report(content, &path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "{} Saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn new_spinner(msg: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(msg);
    spinner
}

// Command handlers

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  GARAGE NEWS INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let target = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or("~/.config/garage-news/");
    let force = args.get_flag("force");
    let config_dir = expand_path(target);
    let config_file = config_dir.join("sources.yaml");
    let db_path = config_dir.join(DEFAULT_DATABASE_PATH);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let config_exists = config_file.exists();
    let db_exists = Database::exists(&db_path);

    if (config_exists || db_exists) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Existing files found:");
        if config_exists {
            println!(
                "  {} {}",
                "•".yellow(),
                config_file.display().to_string().bright_white()
            );
        }
        if db_exists {
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
        }
        println!();
        println!("{}", "This operation will overwrite them.".yellow());

        let response = print_prompt("Do you want to continue? [y/N]:")?;
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    println!("{} Creating directory structure...", "→".blue());
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating {}", config_dir.display()))?;

    let sample = SAMPLE_CONFIG.replace(
        &format!("database_path: {}", DEFAULT_DATABASE_PATH),
        &format!("database_path: {}", db_path.display()),
    );
    fs::write(&config_file, sample)
        .with_context(|| format!("writing {}", config_file.display()))?;
    println!(
        "  {} {}",
        "✓".green(),
        config_file.display().to_string().bright_white()
    );

    if db_exists {
        Database::drop(&db_path)
            .with_context(|| format!("removing {}", db_path.display()))?;
        println!("  {} Existing database removed", "✓".green());
    }
    Database::new(&db_path).with_context(|| format!("creating {}", db_path.display()))?;
    println!(
        "  {} {}",
        "✓".green(),
        db_path.display().to_string().bright_white()
    );

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Edit your sources in {}",
        "→".blue(),
        config_file.display().to_string().bright_white()
    );
    println!(
        "{} Then run: {}",
        "→".blue(),
        format!("garage-news run -c {}", config_file.display()).cyan()
    );
    println!();
    Ok(())
}

pub async fn handle_run(args: &ArgMatches, quiet: bool) -> Result<()> {
    let urls: Vec<String> = args
        .get_many::<String>("url")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let config = load_run_config(&config_path(args), &urls)?;

    let options = RunOptions {
        limit_per_source: args.get_one::<usize>("limit-per-source").copied(),
        skip_full_content: args.get_flag("skip-full-content"),
        show_progress: !quiet,
    };

    if !quiet {
        println!(
            "{} Scraping {} source(s)",
            "→".blue(),
            config.sources.len().to_string().cyan()
        );
    }

    let pipeline = Pipeline::new(&config)?;
    let summary = if let Some(csv) = args.get_one::<String>("csv") {
        let mut sink = CsvSink::new(expand_path(csv));
        pipeline.run(&config.sources, &mut sink, &options).await?
    } else {
        let db_path = args
            .get_one::<String>("database")
            .map(|p| expand_path(p))
            .unwrap_or_else(|| config.database_path.clone());
        ensure_parent_dir(&db_path)?;
        let mut db = Database::new(&db_path)
            .with_context(|| format!("opening database {}", db_path.display()))?;
        pipeline.run(&config.sources, &mut db, &options).await?
    };

    let content = match report_format(args) {
        ReportFormat::Json => serde_json::to_string_pretty(&summary)? + "\n",
        ReportFormat::Text => generate_run_report(&summary),
    };
    emit(&content, args.get_one::<String>("output"))
}

pub fn handle_list_sources(args: &ArgMatches) -> Result<()> {
    let sources = load_sources(&config_path(args))?;

    let content = match report_format(args) {
        ReportFormat::Json => serde_json::to_string_pretty(&sources)? + "\n",
        ReportFormat::Text => generate_source_table(&sources),
    };
    print!("{}", content);
    Ok(())
}

pub async fn handle_preview(args: &ArgMatches) -> Result<()> {
    let urls: Vec<String> = args
        .get_many::<String>("url")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let config = load_run_config(&config_path(args), &urls)?;
    let limit = args.get_one::<usize>("limit").copied();

    let spinner = new_spinner(format!("Fetching {} listing(s)...", config.sources.len()));
    let links = Pipeline::new(&config)?
        .preview_links(&config.sources, limit)
        .await;
    spinner.finish_and_clear();

    print!("{}", format_candidate_links(&links));
    Ok(())
}

pub fn handle_add(args: &ArgMatches) -> Result<()> {
    let path = config_path(args);
    if !is_yaml_path(&path) {
        bail!(
            "sources can only be added to a YAML config (.yaml/.yml), not {}",
            path.display()
        );
    }

    let raw_urls: Vec<String> = args
        .get_many::<String>("URL")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let kind = args
        .get_one::<String>("type")
        .map(|t| parse_kind(t))
        .transpose()?;
    let tags: Vec<String> = args
        .get_many::<String>("tag")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut config = if path.exists() {
        load_config(&path)?
    } else {
        AppConfig::default()
    };

    let added = add_sources(
        &mut config,
        &raw_urls,
        args.get_one::<String>("name").map(String::as_str),
        kind,
        args.get_one::<String>("category").map(String::as_str),
        &tags,
    )?;

    if added.is_empty() {
        println!("{} Nothing to add", "→".blue());
        return Ok(());
    }

    save_config(&config, &path)?;
    for source in &added {
        println!(
            "{} Added {} [{}] {}",
            "✓".green().bold(),
            source.display_name.bright_white(),
            source.kind,
            source.seed_url
        );
    }
    println!(
        "{} {} source(s) in {}",
        "→".blue(),
        config.sources.len(),
        path.display()
    );
    Ok(())
}

pub fn handle_insights(args: &ArgMatches) -> Result<()> {
    let db = open_existing_database(args)?;

    let articles = if let Some(since) = date_bound(args, "since")? {
        db.articles_since(since)?
    } else if args.get_flag("all") {
        db.all_articles()?
    } else {
        db.articles_since_last_run()?
    };

    let insights = KeywordSummarizer::default().summarize(&articles);
    let by_website = args
        .get_flag("by-website")
        .then(|| trends_by_website(&articles));

    let content = match report_format(args) {
        ReportFormat::Json => {
            generate_insights_json(&insights, articles.len(), by_website.as_ref())? + "\n"
        }
        ReportFormat::Text => {
            let mut text = generate_insights_text(&insights, articles.len());
            if let Some(ref grouped) = by_website {
                text.push_str(&generate_website_trends_text(grouped));
            }
            text
        }
    };
    emit(&content, args.get_one::<String>("output"))
}

pub fn handle_articles(args: &ArgMatches) -> Result<()> {
    let db = open_existing_database(args)?;
    let limit = args.get_one::<usize>("limit").copied();

    let articles = db.articles_between(
        date_bound(args, "since")?,
        date_bound(args, "until")?,
        limit,
    )?;

    let content = match report_format(args) {
        ReportFormat::Json => serde_json::to_string_pretty(&articles)? + "\n",
        ReportFormat::Text => generate_article_table(&articles),
    };
    print!("{}", content);
    Ok(())
}

pub fn handle_export(args: &ArgMatches) -> Result<()> {
    let db = open_existing_database(args)?;
    let output = args
        .get_one::<String>("output")
        .map(|p| expand_path(p))
        .ok_or_else(|| anyhow!("--output is required"))?;

    let articles = db.articles_between(
        date_bound(args, "since")?,
        date_bound(args, "until")?,
        None,
    )?;
    let rows = export_csv(&articles, &output)?;

    println!(
        "{} Exported {} article(s) to {}",
        "✓".green().bold(),
        rows.to_string().cyan(),
        output.display().to_string().bright_white()
    );
    Ok(())
}

pub async fn handle_discover_feeds(args: &ArgMatches) -> Result<()> {
    let url = args
        .get_one::<Url>("URL")
        .ok_or_else(|| anyhow!("a page URL is required"))?;

    let spinner = new_spinner(format!("Fetching {}", url));
    let html = Fetcher::new()?.fetch_html(url.as_str()).await;
    spinner.finish_and_clear();

    let html = html.with_context(|| format!("fetching {}", url))?;
    let feeds = discover_feeds(url.as_str(), &html);

    if feeds.is_empty() {
        println!("{} No feeds advertised on {}", "→".yellow(), url);
        return Ok(());
    }

    println!(
        "{} Found {} feed(s) on {}",
        "✓".green().bold(),
        feeds.len(),
        url.as_str().bright_white()
    );
    for feed in &feeds {
        println!("  {} {}", "→".blue(), feed);
    }
    Ok(())
}

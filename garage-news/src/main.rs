use colored::Colorize;
use commands::command_argument_builder;
use garage_news::handlers::*;
use garage_news_core::print_banner;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("run", primary_command)) => handle_run(primary_command, quiet).await,
        Some(("list-sources", primary_command)) => handle_list_sources(primary_command),
        Some(("preview", primary_command)) => handle_preview(primary_command).await,
        Some(("add", primary_command)) => handle_add(primary_command),
        Some(("insights", primary_command)) => handle_insights(primary_command),
        Some(("articles", primary_command)) => handle_articles(primary_command),
        Some(("export", primary_command)) => handle_export(primary_command),
        Some(("discover-feeds", primary_command)) => {
            handle_discover_feeds(primary_command).await
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

/// `-v` logs at info and `-vv` at debug. Without either, `RUST_LOG` applies, falling back to `warn`.
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = if verbosity > 0 {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

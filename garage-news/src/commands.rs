use crate::CLAP_STYLING;
use clap::{arg, command};
use garage_news_core::config::DEFAULT_CONFIG_PATH;
use url::Url;

fn config_arg() -> clap::Arg {
    arg!(-c --"config" <PATH>)
        .required(false)
        .help("Source list: a YAML config (.yaml/.yml) or a plain-text file of URLs")
        .default_value(DEFAULT_CONFIG_PATH)
}

fn database_arg() -> clap::Arg {
    arg!(-d --"database" <PATH>)
        .required(false)
        .help("SQLite database path (default: database_path from the config file)")
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Output format: text, json")
        .value_parser(["text", "json"])
        .default_value("text")
}

fn since_arg() -> clap::Arg {
    arg!(--"since" <DATE>)
        .required(false)
        .help("Only articles scraped at or after this date (RFC 3339 or YYYY-MM-DD)")
}

fn until_arg() -> clap::Arg {
    arg!(--"until" <DATE>)
        .required(false)
        .help("Only articles scraped at or before this date (RFC 3339 or YYYY-MM-DD)")
}

fn url_override_arg() -> clap::Arg {
    arg!(-u --"url" <URL>)
        .required(false)
        .help("Scrape this listing page or feed instead of the configured sources (repeatable)")
        .action(clap::ArgAction::Append)
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("garage-news")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("garage-news")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .global(true)
                .action(clap::ArgAction::Count),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates a starter source list and database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to hold sources.yaml and the database")
                        .default_value("~/.config/garage-news/"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing config file and database without asking")
                        .required(false)
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("run")
                .about("Scrape every configured source and store new articles")
                .arg(config_arg())
                .arg(url_override_arg())
                .arg(database_arg().conflicts_with("csv"))
                .arg(
                    arg!(--"csv" <PATH>)
                        .required(false)
                        .help("Write this run's articles to a CSV file instead of the database"),
                )
                .arg(
                    arg!(-l --"limit-per-source" <NUM>)
                        .required(false)
                        .help("Process at most this many new articles per source")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"skip-full-content")
                        .required(false)
                        .help("Record article links and titles only, without fetching each article")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(format_arg())
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the run summary to a file (default: display to screen)"),
                ),
        )
        .subcommand(
            command!("list-sources")
                .about("Show the configured sources")
                .arg(config_arg())
                .arg(format_arg()),
        )
        .subcommand(
            command!("preview")
                .about("Show the article links each source would yield, without fetching articles")
                .arg(config_arg())
                .arg(url_override_arg())
                .arg(
                    arg!(-l --"limit" <NUM>)
                        .required(false)
                        .help("Show at most this many links per source")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            command!("add")
                .about("Add one or more sources to a YAML config file")
                .arg(
                    arg!(<URL> ...)
                        .help("Listing page or feed URLs (comma or space separated)"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("YAML config file to update (created if missing)")
                        .default_value(DEFAULT_CONFIG_PATH),
                )
                .arg(
                    arg!(-n --"name" <NAME>)
                        .required(false)
                        .help("Display name (only used when adding a single URL)"),
                )
                .arg(
                    arg!(-t --"type" <TYPE>)
                        .required(false)
                        .help("Source type (default: guessed from the URL)")
                        .value_parser(["rss", "website"]),
                )
                .arg(
                    arg!(--"category" <CATEGORY>)
                        .required(false)
                        .help("Optional category label"),
                )
                .arg(
                    arg!(--"tag" <TAG>)
                        .required(false)
                        .help("Tag to attach (repeatable)")
                        .action(clap::ArgAction::Append),
                ),
        )
        .subcommand(
            command!("insights")
                .about("Summarise stored articles and surface trending topics")
                .arg(config_arg())
                .arg(database_arg())
                .arg(
                    arg!(--"all")
                        .required(false)
                        .help("Analyse every stored article (default: since the last completed run)")
                        .action(clap::ArgAction::SetTrue)
                        .conflicts_with("since"),
                )
                .arg(since_arg())
                .arg(
                    arg!(--"by-website")
                        .required(false)
                        .help("Also break trends down per website")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(format_arg())
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the insights to a file (default: display to screen)"),
                ),
        )
        .subcommand(
            command!("articles")
                .about("List stored articles, newest first")
                .arg(config_arg())
                .arg(database_arg())
                .arg(
                    arg!(-l --"limit" <NUM>)
                        .required(false)
                        .help("Maximum number of articles to show")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(since_arg())
                .arg(until_arg())
                .arg(format_arg()),
        )
        .subcommand(
            command!("export")
                .about("Export stored articles to a CSV file")
                .arg(config_arg())
                .arg(database_arg())
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(true)
                        .help("CSV file to write"),
                )
                .arg(since_arg())
                .arg(until_arg()),
        )
        .subcommand(
            command!("discover-feeds")
                .about("Find the RSS/Atom feeds a web page advertises")
                .arg(
                    arg!(<URL>)
                        .help("Page to inspect")
                        .value_parser(clap::value_parser!(Url)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "garage-news",
                "-q",
                "run",
                "--limit-per-source",
                "1",
                "--skip-full-content",
                "-u",
                "https://a.com/news/",
                "-u",
                "https://b.com/feed",
            ])
            .unwrap();

        assert!(matches.get_flag("quiet"));
        let (name, run) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert_eq!(run.get_one::<usize>("limit-per-source"), Some(&1));
        assert!(run.get_flag("skip-full-content"));
        assert_eq!(run.get_many::<String>("url").unwrap().count(), 2);
        assert_eq!(
            run.get_one::<String>("config").map(String::as_str),
            Some(DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn test_csv_conflicts_with_database() {
        let result = command_argument_builder().try_get_matches_from([
            "garage-news",
            "run",
            "--csv",
            "out.csv",
            "--database",
            "news.db",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let matches = command_argument_builder()
            .try_get_matches_from(["garage-news", "-vv", "list-sources"])
            .unwrap();
        assert_eq!(matches.get_count("verbose"), 2);
    }
}

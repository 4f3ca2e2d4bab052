pub mod cli;
pub mod config;
pub mod explain;
pub mod post;
pub mod query;
pub mod search;

use anyhow::Context;
use regex::Regex;
pub use cli::{Cli, ColorMode, Commands, OutputFormat, cli_parse};
pub use config::{ConfigError, EngineConfig, load_config};
pub use post::{Post, PostLoadError, PostStatus, PostTime, load_posts};
pub use query::{
    Node, ParseCache, ParseResult, Preprocessed, QueryError, matches, parse_query, preprocess,
};
pub use search::{SearchOptions, SearchOutcome, search_posts};
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;
use tracing_subscriber::EnvFilter;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ansi escape regex"));

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_color_mode(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
}

fn write_output_file(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

/// Drops SGR escape sequences so files never carry terminal colors.
fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_RE.replace_all(text, "")
}

fn emit(text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    print!("{text}");
    if !text.ends_with('\n') {
        println!();
    }
    if let Some(path) = output {
        write_output_file(path, &strip_ansi(text))?;
    }
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    init_logging(&cli);
    apply_color_mode(cli.color);

    let engine_config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    let output = cli.output.as_deref();

    tracing::info!(
        profile = %engine_config.profile_name,
        config = ?cli.config,
        format = ?cli.format,
        "starting"
    );

    match &cli.command {
        Commands::Search {
            posts,
            query,
            status,
            by_matches,
            page,
            per_page,
        } => {
            let records = load_posts(posts)?;
            tracing::info!(count = records.len(), file = %posts.display(), "loaded posts");

            let mut options = SearchOptions::from_config(&engine_config)
                .page(*page)
                .by_matches(*by_matches);
            if let Some(status) = status {
                options = options.status((*status).into());
            }
            if let Some(per_page) = per_page {
                options = options.per_page(*per_page);
            }

            let mut cache = ParseCache::new(
                engine_config.query.cache_capacity,
                engine_config.query.options(),
            );
            let outcome = search_posts(&records, query, &options, &mut cache);

            let text = match cli.format {
                OutputFormat::Text => search::format_search_text(&records, &outcome),
                OutputFormat::Json => search::format_search_json(&records, query, &outcome),
            };
            emit(&text, output)?;
        }
        Commands::Parse { query } => {
            let result = crate::query::parse_query_with(query, &engine_config.query.options());
            let text = match cli.format {
                OutputFormat::Text => explain::format_parse_text(query, &result),
                OutputFormat::Json => explain::format_parse_json(query, &result),
            };
            emit(&text, output)?;
        }
        Commands::Preprocess { query } => {
            let pre = preprocess(query);
            let text = match cli.format {
                OutputFormat::Text => explain::format_preprocess_text(query, &pre),
                OutputFormat::Json => explain::format_preprocess_json(query, &pre),
            };
            emit(&text, output)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_removes_color_codes() {
        let colored = "\x1b[1;33mwarning:\x1b[0m bad score";
        assert_eq!(strip_ansi(colored), "warning: bad score");
        assert!(matches!(strip_ansi("plain"), Cow::Borrowed("plain")));
    }
}

use crate::query::StatusSelector;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Search scraped gallery posts with the advanced query language
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine config file (TOML)
    #[arg(long, global = true, env = "GALLERY_QUERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'F', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write the output to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Filter a posts file with a query
    Search {
        /// JSON or JSON5 file: an array of posts or {"posts": [...]}
        posts: PathBuf,

        /// Query text, e.g. "(cat|dog) score:>=100 -blonde"
        query: String,

        /// Candidate set when the query has no status: directive
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Order results by number of matching positive tags
        #[arg(long)]
        by_matches: bool,

        /// Page to show, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Page size when the query has no per-page: directive
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Show the parsed form of a query
    Parse {
        /// Query text
        query: String,
    },
    /// Show the directives, cleaned query and positive tags of a query
    Preprocess {
        /// Query text
        query: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Saved,
    Discarded,
    All,
}

impl From<StatusArg> for StatusSelector {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => StatusSelector::Pending,
            StatusArg::Saved => StatusSelector::Saved,
            StatusArg::Discarded => StatusSelector::Discarded,
            StatusArg::All => StatusSelector::All,
        }
    }
}

impl Cli {
    /// Default log filter directive for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}

use std::io::{self, BufWriter, IsTerminal};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use linescout::{search, ColorChoice, SearchConfig, Sink};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "linescout",
    version,
    about = "Recursively search for a pattern in files, honoring .gitignore"
)]
struct Cli {
    /// Pattern to search for (literal or regular expression)
    pattern: String,

    /// Paths to search (default: current directory)
    paths: Vec<PathBuf>,

    /// Case-insensitive matching
    #[arg(short = 'i', long = "ignore-case")]
    ignore_case: bool,

    /// Only match at word boundaries
    #[arg(short = 'w', long = "word-regexp")]
    word_boundary: bool,

    /// Show line numbers
    #[arg(short = 'n', long = "line-number")]
    line_numbers: bool,

    /// Only print a match count per file
    #[arg(short = 'c', long = "count")]
    count: bool,

    /// Only print the names of matching files
    #[arg(short = 'l', long = "files-with-matches")]
    files_with_matches: bool,

    /// Include or exclude files by glob; prefix with ! to exclude
    #[arg(short = 'g', long = "glob", value_name = "GLOB")]
    globs: Vec<String>,

    /// Do not respect .gitignore files
    #[arg(long = "no-ignore")]
    no_ignore: bool,

    /// Search hidden files and directories
    #[arg(long)]
    hidden: bool,

    /// Number of worker threads (default: CPU count)
    #[arg(short = 'j', long = "threads", value_name = "N")]
    threads: Option<NonZeroUsize>,

    /// Maximum directory depth to descend below the roots
    #[arg(short = 'd', long = "max-depth", value_name = "N")]
    max_depth: Option<usize>,

    /// When to use colors (auto, always, never)
    #[arg(long, default_value = "auto", value_name = "WHEN")]
    color: ColorChoice,

    /// Group matches under a per-file heading
    #[arg(long, overrides_with = "no_heading")]
    heading: bool,

    /// One line per match with the file name prefixed
    #[arg(long = "no-heading", overrides_with = "heading")]
    no_heading: bool,

    /// Never use colors (same as --color never)
    #[arg(long = "no-color")]
    no_color: bool,

    /// Load configuration from this file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let cli_config = SearchConfig {
        pattern: cli.pattern,
        paths: cli.paths,
        ignore_case: cli.ignore_case,
        word_boundary: cli.word_boundary,
        line_numbers: cli.line_numbers,
        count_only: cli.count,
        files_with_matches: cli.files_with_matches,
        globs: cli.globs,
        no_ignore: cli.no_ignore,
        hidden: cli.hidden,
        thread_count: cli
            .threads
            .unwrap_or(SearchConfig::default().thread_count),
        max_depth: cli.max_depth,
        color: if cli.no_color {
            ColorChoice::Never
        } else {
            cli.color
        },
        heading: if cli.heading {
            Some(true)
        } else if cli.no_heading {
            Some(false)
        } else {
            None
        },
        log_level: cli.log_level,
    };

    let config = SearchConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(cli_config);

    init_tracing(&config.log_level);

    let stdout = io::stdout();
    let is_tty = stdout.is_terminal();
    let use_color = match config.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => is_tty,
    };
    // Keep our own stderr diagnostics in line with the policy.
    match config.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    let heading = config.heading.unwrap_or(is_tty);

    let writer = BufWriter::new(io::stdout());
    let sink = Sink::new(Box::new(writer), use_color, heading);

    let summary = search(&config, &sink)?;
    Ok(summary.total_matches > 0)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

//! Run configuration.
//!
//! Configuration can be loaded from multiple locations, in order of
//! precedence:
//! 1. A custom config file passed via `--config`
//! 2. A local `.linescout.yaml` in the current directory
//! 3. A global `$XDG_CONFIG_HOME/linescout/config.yaml`
//!
//! The file uses YAML, for example:
//!
//! ```yaml
//! ignore_case: true
//! hidden: false
//! thread_count: 4
//! color: auto
//! log_level: "warn"
//! ```
//!
//! Command-line arguments always take precedence over file values; the
//! merging rules live in [`SearchConfig::merge_with_cli`].

use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Color when the output is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            other => Err(format!("invalid color choice: {other}")),
        }
    }
}

/// Fully resolved configuration for one search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// The pattern to search for; literal or regex, decided by content.
    #[serde(skip)]
    pub pattern: String,

    /// Root paths to search. Empty means the current directory.
    #[serde(skip)]
    pub paths: Vec<PathBuf>,

    /// Case-insensitive matching (ASCII folding), literal and regex alike.
    pub ignore_case: bool,

    /// Only report matches whose edges fall on word boundaries.
    pub word_boundary: bool,

    /// Force line numbers on.
    pub line_numbers: bool,

    /// Emit one `file:count` line per matching file, no content.
    pub count_only: bool,

    /// Emit only the names of matching files.
    pub files_with_matches: bool,

    /// `-g` include/exclude globs; a leading `!` excludes.
    pub globs: Vec<String>,

    /// Skip `.gitignore` consultation entirely.
    pub no_ignore: bool,

    /// Descend into dot-prefixed files and directories.
    pub hidden: bool,

    /// Worker thread count.
    pub thread_count: NonZeroUsize,

    /// Maximum directory recursion depth; root entries are depth 1.
    pub max_depth: Option<usize>,

    /// ANSI color policy.
    pub color: ColorChoice,

    /// Grouped-by-file output; `None` means decide from the terminal.
    pub heading: Option<bool>,

    /// Log level for diagnostics (trace, debug, info, warn, error).
    pub log_level: String,
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            pattern: String::new(),
            paths: Vec::new(),
            ignore_case: false,
            word_boundary: false,
            line_numbers: false,
            count_only: false,
            files_with_matches: false,
            globs: Vec::new(),
            no_ignore: false,
            hidden: false,
            thread_count: default_thread_count(),
            max_depth: None,
            color: ColorChoice::Auto,
            heading: None,
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from an explicit file.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("linescout/config.yaml")),
            Some(PathBuf::from(".linescout.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments over configuration file values. CLI values win
    /// wherever the CLI actually set something.
    pub fn merge_with_cli(mut self, cli: SearchConfig) -> Self {
        self.pattern = cli.pattern;
        if !cli.paths.is_empty() {
            self.paths = cli.paths;
        }
        self.ignore_case |= cli.ignore_case;
        self.word_boundary |= cli.word_boundary;
        self.line_numbers |= cli.line_numbers;
        self.count_only |= cli.count_only;
        self.files_with_matches |= cli.files_with_matches;
        if !cli.globs.is_empty() {
            self.globs = cli.globs;
        }
        self.no_ignore |= cli.no_ignore;
        self.hidden |= cli.hidden;
        // Thread count is always taken from the CLI-resolved value.
        self.thread_count = cli.thread_count;
        if cli.max_depth.is_some() {
            self.max_depth = cli.max_depth;
        }
        if cli.color != ColorChoice::Auto {
            self.color = cli.color;
        }
        if cli.heading.is_some() {
            self.heading = cli.heading;
        }
        if cli.log_level != default_log_level() {
            self.log_level = cli.log_level;
        }
        self
    }

    /// The search roots, defaulting to the current directory.
    pub fn roots(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.paths.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert!(!config.ignore_case);
        assert!(!config.hidden);
        assert_eq!(config.color, ColorChoice::Auto);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.max_depth, None);
        assert_eq!(config.roots(), vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
ignore_case: true
hidden: true
globs: ["*.rs"]
thread_count: 4
max_depth: 3
color: never
log_level: "debug"
"#,
        )
        .unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert!(config.ignore_case);
        assert!(config.hidden);
        assert_eq!(config.globs, vec!["*.rs".to_string()]);
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.max_depth, Some(3));
        assert_eq!(config.color, ColorChoice::Never);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "thread_count: \"lots\"\n").unwrap();
        assert!(SearchConfig::load_from(Some(&config_path)).is_err());
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = SearchConfig {
            ignore_case: true,
            globs: vec!["*.rs".to_string()],
            log_level: "info".to_string(),
            ..Default::default()
        };

        let cli_config = SearchConfig {
            pattern: "needle".to_string(),
            paths: vec![PathBuf::from("src")],
            word_boundary: true,
            max_depth: Some(2),
            color: ColorChoice::Never,
            ..Default::default()
        };

        let merged = file_config.merge_with_cli(cli_config);
        assert_eq!(merged.pattern, "needle");
        assert_eq!(merged.paths, vec![PathBuf::from("src")]);
        assert!(merged.ignore_case); // file value survives
        assert!(merged.word_boundary); // CLI value
        assert_eq!(merged.globs, vec!["*.rs".to_string()]); // file value (CLI empty)
        assert_eq!(merged.max_depth, Some(2));
        assert_eq!(merged.color, ColorChoice::Never);
        assert_eq!(merged.log_level, "info");
    }

    #[test]
    fn test_color_choice_from_str() {
        assert_eq!("auto".parse::<ColorChoice>().unwrap(), ColorChoice::Auto);
        assert_eq!(
            "always".parse::<ColorChoice>().unwrap(),
            ColorChoice::Always
        );
        assert_eq!("never".parse::<ColorChoice>().unwrap(), ColorChoice::Never);
        assert!("sometimes".parse::<ColorChoice>().is_err());
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{Role, TallyMode, TransferKind};
use crate::settings::SettingsChange;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// unsmurf - puppet-aware card trade tallies
///
/// Groups the trade partners of a nation by their owning master, using
/// community alias tables, or by collapsing numbered puppet names.
///
/// Examples:
///   unsmurf tally testlandia
///   unsmurf tally testlandia --role seller --kind gifts --mode name
///   unsmurf trades testlandia --limit 50
///   unsmurf puppets testlandia
///   unsmurf resolve "Testlandia Puppet 3" nation12
///   unsmurf normalize empireIX card_farm_2024
///   unsmurf collect --output static/puppetData.tsv --members static/currentNations.txt
///   unsmurf settings --alias-mode false --cache-window-hours 6
///   unsmurf init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .unsmurf.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the settings file
    #[arg(long, global = true, value_name = "FILE", env = "UNSMURF_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Base URL of the trades API
    #[arg(long, global = true, value_name = "URL", env = "UNSMURF_TRADES_API")]
    pub trades_api: Option<String>,

    /// Membership list location (URL or file)
    #[arg(long, global = true, value_name = "LOCATION")]
    pub membership: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Rank the trade partners of a nation
    Tally(TallyArgs),

    /// List every trade of a nation with masters and membership markers
    Trades(ListArgs),

    /// List the puppets registered to a master
    Puppets {
        /// Master nation name
        master: String,
    },

    /// Resolve nation names to their masters
    Resolve {
        /// Nation names to resolve
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show the numbering-scheme normalization of labels
    Normalize {
        /// Labels to normalize
        #[arg(required = true)]
        labels: Vec<String>,
    },

    /// Merge every alias table into one local TSV file and export the
    /// membership list next to it
    Collect {
        /// Output file path
        #[arg(short, long, default_value = "puppetData.tsv", value_name = "FILE")]
        output: PathBuf,

        /// Membership export path (one nation per line)
        #[arg(long, default_value = "currentNations.txt", value_name = "FILE")]
        members: PathBuf,
    },

    /// Show the saved settings, changing any that are given
    Settings(SettingsArgs),

    /// Generate a default .unsmurf.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TallyArgs {
    /// Nation whose trade partners are tallied
    pub nation: String,

    /// Which partners to rank: those who bought from the nation (buyer)
    /// or those who sold to it (seller)
    #[arg(short, long, default_value = "buyer")]
    pub role: Role,

    /// Count paid trades or free gifts
    #[arg(short, long, default_value = "trades")]
    pub kind: TransferKind,

    /// Grouping mode; defaults to the saved setting
    #[arg(short, long)]
    pub mode: Option<TallyMode>,

    /// Read trades from a local JSON file instead of the API
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Maximum number of rows to show
    #[arg(short, long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    /// Nation whose trades are listed
    pub nation: String,

    /// Which side of each trade to show: the buyers from the nation or
    /// the sellers to it
    #[arg(short, long, default_value = "buyer")]
    pub role: Role,

    /// List paid trades or free gifts
    #[arg(short, long, default_value = "trades")]
    pub kind: TransferKind,

    /// Read trades from a local JSON file instead of the API
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Maximum number of rows to show
    #[arg(short, long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the listing to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Group by alias tables unless a command picks a mode
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub alias_mode: Option<bool>,

    /// Hours between alias data reloads
    #[arg(long, value_name = "HOURS", conflicts_with = "clear_cache_window")]
    pub cache_window_hours: Option<u64>,

    /// Fall back to the configured reload interval
    #[arg(long)]
    pub clear_cache_window: bool,

    /// Show alias-table masters in name mode
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub show_masters: Option<bool>,

    /// Mark nations missing from the membership list
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub show_membership: Option<bool>,
}

impl SettingsArgs {
    /// The fields given on the command line.
    pub fn change(&self) -> SettingsChange {
        SettingsChange {
            alias_mode_active: self.alias_mode,
            cache_window_hours: self.cache_window_hours,
            clear_cache_window: self.clear_cache_window,
            show_masters: self.show_masters,
            show_membership: self.show_membership,
        }
    }
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref api) = self.trades_api {
            if !api.starts_with("http://") && !api.starts_with("https://") {
                return Err("Trades API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        match self.command {
            Command::Tally(ref tally) => {
                validate_trade_source(&tally.nation, tally.limit, tally.input.as_deref())?
            }
            Command::Trades(ref list) => {
                validate_trade_source(&list.nation, list.limit, list.input.as_deref())?
            }
            Command::Settings(ref settings) => {
                if settings.cache_window_hours == Some(0) {
                    return Err("Cache window must be at least 1 hour".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn validate_trade_source(
    nation: &str,
    limit: Option<usize>,
    input: Option<&std::path::Path>,
) -> Result<(), String> {
    if nation.trim().is_empty() {
        return Err("Nation name must not be empty".to_string());
    }
    if limit == Some(0) {
        return Err("Limit must be at least 1".to_string());
    }
    if let Some(input) = input {
        if !input.is_file() {
            return Err(format!("Trades file does not exist: {}", input.display()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tally() -> TallyArgs {
        TallyArgs {
            nation: "testlandia".to_string(),
            role: Role::Buyer,
            kind: TransferKind::Trades,
            mode: None,
            input: None,
            limit: None,
            format: OutputFormat::Markdown,
            output: None,
        }
    }

    fn make_args() -> Args {
        Args {
            command: Command::Tally(make_tally()),
            config: None,
            settings: None,
            verbose: false,
            quiet: false,
            timeout: None,
            trades_api: None,
            membership: None,
        }
    }

    #[test]
    fn test_parse_tally() {
        let args = Args::try_parse_from([
            "unsmurf", "tally", "testlandia", "--role", "seller", "--kind", "gifts", "--mode",
            "name", "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Command::Tally(tally) => {
                assert_eq!(tally.nation, "testlandia");
                assert_eq!(tally.role, Role::Seller);
                assert_eq!(tally.kind, TransferKind::Gifts);
                assert_eq!(tally.mode, Some(TallyMode::Name));
                assert_eq!(tally.format, OutputFormat::Markdown);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_resolve_requires_names() {
        assert!(Args::try_parse_from(["unsmurf", "resolve"]).is_err());

        let args = Args::try_parse_from(["unsmurf", "resolve", "a", "b"]).unwrap();
        assert!(matches!(args.command, Command::Resolve { ref names } if names.len() == 2));
    }

    #[test]
    fn test_parse_trades_listing() {
        let args = Args::try_parse_from([
            "unsmurf", "trades", "testlandia", "--role", "seller", "--limit", "25", "--format",
            "json",
        ])
        .unwrap();

        match args.command {
            Command::Trades(list) => {
                assert_eq!(list.nation, "testlandia");
                assert_eq!(list.role, Role::Seller);
                assert_eq!(list.kind, TransferKind::Trades);
                assert_eq!(list.limit, Some(25));
                assert_eq!(list.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_collect_defaults() {
        let args = Args::try_parse_from(["unsmurf", "collect"]).unwrap();
        match args.command {
            Command::Collect { output, members } => {
                assert_eq!(output, PathBuf::from("puppetData.tsv"));
                assert_eq!(members, PathBuf::from("currentNations.txt"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_settings() {
        let args = Args::try_parse_from([
            "unsmurf",
            "settings",
            "--alias-mode",
            "false",
            "--cache-window-hours",
            "6",
            "--show-masters",
            "true",
        ])
        .unwrap();

        let Command::Settings(settings) = args.command else {
            panic!("expected settings command");
        };
        assert_eq!(
            settings.change(),
            SettingsChange {
                alias_mode_active: Some(false),
                cache_window_hours: Some(6),
                clear_cache_window: false,
                show_masters: Some(true),
                show_membership: None,
            }
        );

        let args = Args::try_parse_from(["unsmurf", "settings"]).unwrap();
        let Command::Settings(settings) = args.command else {
            panic!("expected settings command");
        };
        assert!(settings.change().is_empty());

        assert!(Args::try_parse_from([
            "unsmurf",
            "settings",
            "--cache-window-hours",
            "6",
            "--clear-cache-window",
        ])
        .is_err());
        assert!(Args::try_parse_from(["unsmurf", "settings", "--alias-mode", "maybe"]).is_err());
    }

    #[test]
    fn test_validation_zero_cache_window() {
        let mut args = make_args();
        args.command = Command::Settings(SettingsArgs {
            cache_window_hours: Some(0),
            ..SettingsArgs::default()
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_limit() {
        let mut tally = make_tally();
        tally.limit = Some(0);
        let mut args = make_args();
        args.command = Command::Tally(tally);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_trades_api_scheme() {
        let mut args = make_args();
        args.trades_api = Some("maki.kractero.com/api".to_string());
        assert!(args.validate().is_err());

        args.trades_api = Some("https://maki.kractero.com/api".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}

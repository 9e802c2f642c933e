//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.unsmurf.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".unsmurf.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where alias, membership and trade data come from.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Identity resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Group by alias-table master (true) or by normalized name (false).
    #[serde(default = "default_true")]
    pub alias_mode: bool,

    /// How long a loaded alias index stays valid.
    #[serde(default = "default_cache_window_hours")]
    pub cache_window_hours: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alias_mode: true,
            cache_window_hours: default_cache_window_hours(),
        }
    }
}

impl EngineConfig {
    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_hours.saturating_mul(60 * 60))
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_window_hours() -> u64 {
    12
}

/// One delimiter-separated puppet -> master table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasTable {
    /// Table name; used as the source tag when `tag_column` is unset.
    pub name: String,

    /// `http(s)://` URL or local file path.
    pub location: String,

    #[serde(default)]
    pub puppet_column: usize,

    #[serde(default = "default_master_column")]
    pub master_column: usize,

    /// Column holding the source tag (as in a collected table).
    #[serde(default)]
    pub tag_column: Option<usize>,

    /// Leading rows to skip.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_master_column() -> usize {
    1
}

fn default_header_rows() -> usize {
    1
}

fn default_delimiter() -> char {
    '\t'
}

impl AliasTable {
    fn sheet(name: &str, location: &str, header_rows: usize) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            puppet_column: 0,
            master_column: default_master_column(),
            tag_column: None,
            header_rows,
            delimiter: default_delimiter(),
        }
    }
}

/// Shape of the membership list payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipFormat {
    /// One identity per line.
    #[default]
    Lines,
    /// Comma-separated list inside a `<NATIONS>` element.
    NationsXml,
}

/// Location of the current-identity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipSource {
    pub location: String,

    #[serde(default)]
    pub format: MembershipFormat,
}

impl Default for MembershipSource {
    fn default() -> Self {
        Self {
            location: "https://www.nationstates.net/cgi-bin/api.cgi?q=nations".to_string(),
            format: MembershipFormat::NationsXml,
        }
    }
}

/// Data source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Alias tables, in priority order (later tables override earlier ones).
    #[serde(default = "default_alias_tables")]
    pub alias_tables: Vec<AliasTable>,

    #[serde(default)]
    pub membership: MembershipSource,

    /// Card id -> name table (`id\tname`, one header row), consulted for
    /// records without a card name.
    #[serde(default)]
    pub card_names: Option<String>,

    /// Base URL of the trades API.
    #[serde(default = "default_trades_api")]
    pub trades_api: String,

    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            alias_tables: default_alias_tables(),
            membership: MembershipSource::default(),
            card_names: None,
            trades_api: default_trades_api(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_alias_tables() -> Vec<AliasTable> {
    vec![
        AliasTable::sheet(
            "9003",
            "https://docs.google.com/spreadsheets/d/1MZ-4GLWAZDgB1TDvwtssEcVKHKunOKi3l90Jof1pBB4/export?format=tsv&id=1MZ-4GLWAZDgB1TDvwtssEcVKHKunOKi3l90Jof1pBB4&gid=733627866",
            1,
        ),
        AliasTable::sheet(
            "XKI",
            "https://docs.google.com/spreadsheets/d/e/2PACX-1vSem15AVLXgdjxWBZOnWRFnF6NwkY0gVKPYI8aWuHJzlbyILBL3o1F5GK1hSK3iiBlXLIZBI5jdpkVr/pub?gid=916202163&single=true&output=tsv",
            0,
        ),
        AliasTable::sheet(
            "Rot",
            "https://docs.google.com/spreadsheets/d/1osIbavh59GHFqQCO909jFRDX5XerSvZ7sWFfgMHLFs4/export?format=tsv&id=1osIbavh59GHFqQCO909jFRDX5XerSvZ7sWFfgMHLFs4",
            1,
        ),
        AliasTable::sheet(
            "Rot Ext",
            "https://docs.google.com/spreadsheets/d/1osIbavh59GHFqQCO909jFRDX5XerSvZ7sWFfgMHLFs4/export?format=tsv&id=1osIbavh59GHFqQCO909jFRDX5XerSvZ7sWFfgMHLFs4&gid=708581263",
            1,
        ),
    ]
}

fn default_trades_api() -> String {
    "https://maki.kractero.com/api".to_string()
}

fn default_user_agent() -> String {
    format!("unsmurf/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Mark identities missing from the membership list.
    #[serde(default = "default_true")]
    pub show_membership: bool,

    /// Maximum rows to print (all when unset).
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            show_membership: true,
            limit: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly provided CLI values override config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.sources.timeout_seconds = timeout;
        }
        if let Some(ref api) = args.trades_api {
            self.sources.trades_api = api.clone();
        }
        if let Some(ref location) = args.membership {
            self.sources.membership.location = location.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.engine.alias_mode);
        assert_eq!(config.engine.cache_window(), Duration::from_secs(12 * 3600));
        assert_eq!(config.sources.alias_tables.len(), 4);
        assert_eq!(config.sources.alias_tables[1].header_rows, 0);
        assert_eq!(config.sources.membership.format, MembershipFormat::NationsXml);
        assert_eq!(config.sources.card_names, None);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[engine]
alias_mode = false
cache_window_hours = 2

[sources]
card_names = "static/s4.tsv"

[[sources.alias_tables]]
name = "local"
location = "static/puppetData.tsv"
tag_column = 2

[sources.membership]
location = "static/currentNations.txt"
format = "lines"

[report]
limit = 25
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(!config.engine.alias_mode);
        assert_eq!(config.engine.cache_window(), Duration::from_secs(7200));

        let table = &config.sources.alias_tables[0];
        assert_eq!(config.sources.alias_tables.len(), 1);
        assert_eq!(table.puppet_column, 0);
        assert_eq!(table.master_column, 1);
        assert_eq!(table.tag_column, Some(2));
        assert_eq!(table.header_rows, 1);
        assert_eq!(table.delimiter, '\t');

        assert_eq!(config.sources.membership.format, MembershipFormat::Lines);
        assert_eq!(config.sources.card_names.as_deref(), Some("static/s4.tsv"));
        assert_eq!(config.report.limit, Some(25));
        assert!(config.report.show_membership);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[[sources.alias_tables]]"));
        assert!(toml_str.contains("[report]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.sources.alias_tables, Config::default().sources.alias_tables);
    }
}

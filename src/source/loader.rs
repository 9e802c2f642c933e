//! Fetching and splitting of source text.
//!
//! Locations are either `http(s)://` URLs, fetched with a shared reqwest
//! client, or local file paths.

use crate::config::{AliasTable, MembershipFormat, SourcesConfig};
use crate::error::SourceError;
use crate::identity::canonicalize;
use crate::index::{CardNames, SourceData};
use crate::models::AliasRow;
use futures::future::join_all;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

static NATIONS_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<NATIONS>(.*?)</NATIONS>").expect("valid regex"));

/// Fetches raw text from URLs or files.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    http_client: reqwest::Client,
    timeout_seconds: u64,
}

impl SourceLoader {
    pub fn new(user_agent: &str, timeout_seconds: u64) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| SourceError::Transport {
                location: "<client>".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            timeout_seconds,
        })
    }

    pub fn from_config(config: &SourcesConfig) -> Result<Self, SourceError> {
        Self::new(&config.user_agent, config.timeout_seconds)
    }

    /// Fetch the full text at `location`.
    pub async fn fetch_text(&self, location: &str) -> Result<String, SourceError> {
        if is_remote(location) {
            self.fetch_remote(location).await
        } else {
            let path = PathBuf::from(location);
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| SourceError::Io { path, source })
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<String, SourceError> {
        debug!("GET {}", url);

        let response = self.http_client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("timed out after {}s", self.timeout_seconds)
            } else if e.is_connect() {
                "connection failed".to_string()
            } else {
                e.to_string()
            };
            SourceError::Transport {
                location: url.to_string(),
                message,
            }
        })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                location: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|e| SourceError::Decode {
            location: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Like [`fetch_text`](Self::fetch_text), but a failure is logged and
    /// yields an empty string.
    pub async fn fetch_text_or_empty(&self, location: &str) -> String {
        match self.fetch_text(location).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}: {}", location, e);
                String::new()
            }
        }
    }

    /// Fetch and project one alias table.
    pub async fn load_alias_table(&self, table: &AliasTable) -> Result<Vec<AliasRow>, SourceError> {
        debug!("Fetching alias table: {}", table.name);
        let text = self.fetch_text(&table.location).await?;
        let rows = parse_delimited(&text, table.header_rows, table.delimiter);
        Ok(alias_rows(&rows, table))
    }

    /// Fetch the current-identity list.
    pub async fn load_membership(
        &self,
        location: &str,
        format: MembershipFormat,
    ) -> Result<Vec<String>, SourceError> {
        let text = self.fetch_text(location).await?;
        membership_lines(&text, format).ok_or_else(|| SourceError::Decode {
            location: location.to_string(),
            message: "no <NATIONS> element in response".to_string(),
        })
    }

    /// Fetch the card id -> name fallback table.
    pub async fn load_card_names(&self, location: &str) -> Result<CardNames, SourceError> {
        let text = self.fetch_text(location).await?;
        let cards = CardNames::load(&parse_delimited(&text, 1, '\t'));
        info!("Loaded {} card names from {}", cards.len(), location);
        Ok(cards)
    }

    /// Load every alias table and the membership list.
    ///
    /// Tables are fetched concurrently but their rows are concatenated in
    /// configuration order. Any failure fails the whole load.
    pub async fn load_sources(&self, config: &SourcesConfig) -> Result<SourceData, SourceError> {
        let results = join_all(
            config
                .alias_tables
                .iter()
                .map(|table| self.load_alias_table(table)),
        )
        .await;

        let mut alias_rows = Vec::new();
        for (table, result) in config.alias_tables.iter().zip(results) {
            let rows = result?;
            info!("Loaded {} rows from {}", rows.len(), table.name);
            alias_rows.extend(rows);
        }

        if alias_rows.is_empty() && !config.alias_tables.is_empty() {
            return Err(SourceError::Empty {
                source_name: "alias tables".to_string(),
            });
        }

        let members = self
            .load_membership(&config.membership.location, config.membership.format)
            .await?;

        Ok(SourceData {
            alias_rows,
            members,
        })
    }

    /// Fetch every table tolerantly, skipping the ones that fail.
    pub async fn collect_alias_rows(&self, tables: &[AliasTable]) -> Vec<AliasRow> {
        let mut rows = Vec::new();
        for table in tables {
            info!("Fetching data from {}...", table.name);
            let text = self.fetch_text_or_empty(&table.location).await;
            let parsed = parse_delimited(&text, table.header_rows, table.delimiter);
            rows.extend(alias_rows(&parsed, table));
        }
        rows
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Split `text` into rows of columns.
///
/// The first `header_rows` lines are dropped, a trailing `\r` is stripped
/// and blank lines are skipped.
pub fn parse_delimited(text: &str, header_rows: usize, delimiter: char) -> Vec<Vec<String>> {
    text.split('\n')
        .skip(header_rows)
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(delimiter).map(str::to_string).collect())
        .collect()
}

/// Project parsed rows into alias rows, dropping malformed ones.
pub fn alias_rows(rows: &[Vec<String>], table: &AliasTable) -> Vec<AliasRow> {
    let mut out = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for columns in rows {
        let column = |i: usize| columns.get(i).map(String::as_str).unwrap_or("");
        let tag = table
            .tag_column
            .map(column)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(table.name.as_str());

        match AliasRow::from_raw(column(table.puppet_column), column(table.master_column), tag) {
            Some(row) => out.push(row),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("{}: skipped {} malformed rows", table.name, skipped);
    }

    out
}

/// Extract identity lines from a membership payload.
///
/// Returns `None` when an XML payload has no `<NATIONS>` element.
pub fn membership_lines(text: &str, format: MembershipFormat) -> Option<Vec<String>> {
    match format {
        MembershipFormat::Lines => Some(text.lines().map(str::to_string).collect()),
        MembershipFormat::NationsXml => {
            let captures = NATIONS_ELEMENT.captures(text)?;
            Some(captures[1].split(',').map(str::to_string).collect())
        }
    }
}

/// Render a membership list as one canonical identity per line.
pub fn membership_to_text(members: &[String]) -> String {
    members
        .iter()
        .map(|m| canonicalize(m))
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render alias rows as a three-column TSV with a header row.
pub fn alias_rows_to_tsv(rows: &[AliasRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push("puppet\tmaster\tsheet".to_string());
    for row in rows {
        lines.push(format!("{}\t{}\t{}", row.puppet_id, row.master_id, row.source_tag));
    }
    lines.join("\n")
}

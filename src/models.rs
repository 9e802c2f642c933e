//! Data models shared across the engine.
//!
//! This module contains the alias rows fed into the index, the trade
//! records consumed by the aggregator and the tally groups it emits.

use crate::identity::canonicalize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One puppet -> master mapping taken from an alias table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRow {
    /// Canonical puppet identity.
    pub puppet_id: String,
    /// Canonical master identity.
    pub master_id: String,
    /// Name of the table the row came from.
    pub source_tag: String,
}

impl AliasRow {
    /// Builds a row from raw column values, applying field normalization.
    ///
    /// Returns `None` when the puppet or master is empty after normalization.
    pub fn from_raw(puppet: &str, master: &str, source_tag: &str) -> Option<Self> {
        let puppet_id = canonicalize(puppet);
        let master_id = canonicalize(master);

        if puppet_id.is_empty() || master_id.is_empty() {
            return None;
        }

        Some(Self {
            puppet_id,
            master_id,
            source_tag: source_tag.trim().to_string(),
        })
    }
}

/// Which side of a trade a label is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    /// The opposite side of the trade.
    ///
    /// Tallying the buyers of a nation means querying trades where that
    /// nation is the seller.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Buyer => Role::Seller,
            Role::Seller => Role::Buyer,
        }
    }

    /// Query-parameter / field name for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price filter separating paid trades from free transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    /// Priced transfers (`price != 0`).
    #[default]
    Trades,
    /// Free transfers (`price == 0`).
    Gifts,
}

impl TransferKind {
    pub fn matches(self, record: &TradeRecord) -> bool {
        match self {
            TransferKind::Trades => record.price != 0.0,
            TransferKind::Gifts => record.price == 0.0,
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Trades => write!(f, "trades"),
            TransferKind::Gifts => write!(f, "gifts"),
        }
    }
}

/// How labels are reduced to a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TallyMode {
    /// Resolve each label to its master through the alias index.
    Alias,
    /// Collapse numbering schemes in the label itself.
    Name,
}

impl fmt::Display for TallyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TallyMode::Alias => write!(f, "alias"),
            TallyMode::Name => write!(f, "name"),
        }
    }
}

/// A single card transfer as returned by the trades API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default)]
    pub seller: Option<String>,
    /// Price in bank; zero for gifts.
    #[serde(default)]
    pub price: f64,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub card_id: Option<u64>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub card_name: Option<String>,
    /// Rarity category letter.
    #[serde(default)]
    pub category: Option<String>,
}

impl TradeRecord {
    /// The participant label for `role`, if present and non-blank.
    pub fn label(&self, role: Role) -> Option<&str> {
        let value = match role {
            Role::Buyer => self.buyer.as_deref(),
            Role::Seller => self.seller.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

/// One ranked output row of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyGroup {
    /// Grouping key (resolved master or normalized name).
    pub canonical_id: String,
    /// Identity shown to users for this group.
    pub display_id: String,
    /// Raw labels that were folded into this group.
    pub contributing_aliases: BTreeSet<String>,
    /// Number of records in the group.
    pub count: usize,
}

impl TallyGroup {
    /// Number of distinct raw labels folded into this group.
    pub fn alias_count(&self) -> usize {
        self.contributing_aliases.len()
    }
}

/// One rendered row of a tally report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// 1-based position after sorting.
    pub rank: usize,
    pub display_id: String,
    pub canonical_id: String,
    pub count: usize,
    /// Distinct raw labels folded into the row.
    pub alias_count: usize,
    /// Alias-table master of the display id, in name mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    /// Whether the identity is in the membership list; `None` when not checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<bool>,
}

/// Run details shown in the report header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Nation whose trades were tallied.
    pub nation: String,
    pub role: Role,
    pub kind: TransferKind,
    pub mode: TallyMode,
    pub generated_at: DateTime<Utc>,
    /// Build time of the alias snapshot used, if one was loaded.
    pub snapshot_built_at: Option<DateTime<Utc>>,
    /// Records counted across all groups.
    pub total_count: usize,
    /// Number of groups before any row limit.
    pub group_count: usize,
}

/// A complete tally report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyReport {
    pub metadata: ReportMetadata,
    pub rows: Vec<ReportRow>,
}

/// One transfer in a per-record listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRow {
    /// Raw participant label, `N/A` when the record has none.
    pub participant: String,
    /// Resolved master, only when it differs from the participant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_current: Option<bool>,
    pub card_id: Option<u64>,
    pub season: Option<u32>,
    /// Card name from the record, else from the card-name table.
    pub card_name: Option<String>,
    pub category: Option<String>,
    /// `None` for gifts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub timestamp: i64,
}

/// Header details of a transfer listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingMetadata {
    pub nation: String,
    pub role: Role,
    pub kind: TransferKind,
    pub generated_at: DateTime<Utc>,
    pub snapshot_built_at: Option<DateTime<Utc>>,
    /// Transfers matching the kind filter, before any row limit.
    pub record_count: usize,
}

/// Every matching transfer of a nation, newest first as fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeListing {
    pub metadata: ListingMetadata,
    pub rows: Vec<ListingRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(buyer: &str, price: f64) -> TradeRecord {
        TradeRecord {
            buyer: Some(buyer.to_string()),
            seller: Some("seller_nation".to_string()),
            price,
            ..Default::default()
        }
    }

    #[test]
    fn test_alias_row_normalizes_fields() {
        let row = AliasRow::from_raw("  Testlandia Puppet 3 ", "TESTLANDIA", "9003").unwrap();
        assert_eq!(row.puppet_id, "testlandia_puppet_3");
        assert_eq!(row.master_id, "testlandia");
        assert_eq!(row.source_tag, "9003");
    }

    #[test]
    fn test_alias_row_rejects_empty_fields() {
        assert!(AliasRow::from_raw("", "master", "x").is_none());
        assert!(AliasRow::from_raw("puppet", "   ", "x").is_none());
    }

    #[test]
    fn test_role_counterpart() {
        assert_eq!(Role::Buyer.counterpart(), Role::Seller);
        assert_eq!(Role::Seller.counterpart(), Role::Buyer);
        assert_eq!(Role::Buyer.to_string(), "buyer");
    }

    #[test]
    fn test_transfer_kind_filter() {
        assert!(TransferKind::Trades.matches(&record("a", 0.5)));
        assert!(!TransferKind::Trades.matches(&record("a", 0.0)));
        assert!(TransferKind::Gifts.matches(&record("a", 0.0)));
    }

    #[test]
    fn test_label_skips_blank() {
        let mut r = record("  ", 1.0);
        assert_eq!(r.label(Role::Buyer), None);
        assert_eq!(r.label(Role::Seller), Some("seller_nation"));
        r.seller = None;
        assert_eq!(r.label(Role::Seller), None);
    }

    #[test]
    fn test_trade_record_deserialize_partial() {
        let json = r#"{"buyer": "foo_1", "price": 0.25, "timestamp": 1700000000, "card_id": 42, "season": 3}"#;
        let r: TradeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.buyer.as_deref(), Some("foo_1"));
        assert_eq!(r.seller, None);
        assert_eq!(r.card_id, Some(42));
        assert_eq!(r.season, Some(3));
    }
}

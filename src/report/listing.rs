//! Per-transfer listings.
//!
//! Where a tally collapses transfers into ranked identities, a listing
//! keeps one row per transfer and annotates each participant with its
//! master and membership state.

use crate::identity::canonicalize;
use crate::index::{CardNames, Snapshot};
use crate::models::{ListingMetadata, ListingRow, Role, TradeListing, TradeRecord, TransferKind};
use crate::report::ReportOptions;
use anyhow::Result;
use chrono::DateTime;

const MISSING_PARTICIPANT: &str = "N/A";

/// Build a listing of the `records` matching `kind`, in input order.
///
/// `role` picks the participant column. Masters and membership markers
/// follow `options` and need a snapshot; card names missing from a record
/// are looked up in `cards`.
pub fn build_listing(
    mut metadata: ListingMetadata,
    records: &[TradeRecord],
    role: Role,
    kind: TransferKind,
    options: ReportOptions,
    snapshot: Option<&Snapshot>,
    cards: &CardNames,
) -> TradeListing {
    let matching: Vec<&TradeRecord> = records.iter().filter(|r| kind.matches(r)).collect();

    metadata.record_count = matching.len();
    metadata.snapshot_built_at = snapshot.map(|s| s.built_at);

    let keep = options.limit.unwrap_or(matching.len());
    let rows = matching
        .into_iter()
        .take(keep)
        .map(|record| {
            let participant = record
                .label(role)
                .unwrap_or(MISSING_PARTICIPANT)
                .to_string();
            let participant_id = canonicalize(&participant);

            let master = snapshot
                .filter(|_| options.show_masters)
                .and_then(|s| s.aliases.get(&participant_id))
                .map(|entry| entry.master_id.clone())
                .filter(|master| *master != participant_id);

            let membership = snapshot.filter(|_| options.show_membership);
            let current = membership.map(|s| s.membership.contains(&participant_id));
            let master_current = membership
                .zip(master.as_ref())
                .map(|(s, master)| s.membership.contains(master));

            let card_name = record
                .card_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .map(str::to_string)
                .or_else(|| {
                    record
                        .card_id
                        .and_then(|id| cards.get(id))
                        .map(str::to_string)
                });

            ListingRow {
                participant,
                master,
                current,
                master_current,
                card_id: record.card_id,
                season: record.season,
                card_name,
                category: record.category.clone(),
                price: (kind == TransferKind::Trades).then_some(record.price),
                timestamp: record.timestamp,
            }
        })
        .collect();

    TradeListing { metadata, rows }
}

/// Generate a Markdown listing.
pub fn generate_markdown_listing(listing: &TradeListing) -> String {
    let metadata = &listing.metadata;
    let mut output = String::new();

    output.push_str(&format!(
        "# {} of {} ({})\n\n",
        capitalize_kind(metadata.kind),
        metadata.nation,
        metadata.record_count
    ));
    output.push_str(&format!("- **Participants:** {}s\n", metadata.role));
    if let Some(built_at) = metadata.snapshot_built_at {
        output.push_str(&format!(
            "- **Alias data from:** {}\n",
            built_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    output.push('\n');

    if listing.rows.is_empty() {
        output.push_str("No matching transfers were found.\n");
        return output;
    }

    let priced = metadata.kind == TransferKind::Trades;
    if priced {
        output.push_str("| Nation | Card | Rarity | Price | Date |\n");
        output.push_str("|:---|:---|:---:|---:|:---:|\n");
    } else {
        output.push_str("| Nation | Card | Rarity | Date |\n");
        output.push_str("|:---|:---|:---:|:---:|\n");
    }

    for row in &listing.rows {
        let rarity = row.category.as_deref().unwrap_or("C");
        let date = format_date(row.timestamp);
        match row.price {
            Some(price) if priced => output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                participant_label(row),
                card_label(row),
                rarity,
                format_price(price),
                date
            )),
            _ => output.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                participant_label(row),
                card_label(row),
                rarity,
                date
            )),
        }
    }

    if listing.rows.len() < metadata.record_count {
        output.push_str(&format!(
            "\n*Showing {} of {} transfers.*\n",
            listing.rows.len(),
            metadata.record_count
        ));
    }

    output
}

/// Generate a JSON listing.
pub fn generate_json_listing(listing: &TradeListing) -> Result<String> {
    serde_json::to_string_pretty(listing).map_err(Into::into)
}

fn participant_label(row: &ListingRow) -> String {
    let mut label = row.participant.clone();
    if row.current == Some(false) {
        label.push_str(" *(not current)*");
    }
    if let Some(ref master) = row.master {
        label.push_str(&format!(" ({}", master));
        if row.master_current == Some(false) {
            label.push_str(" *(not current)*");
        }
        label.push(')');
    }
    label
}

/// `S3 card_name`, falling back to the card id.
fn card_label(row: &ListingRow) -> String {
    let name = match (&row.card_name, row.card_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("#{}", id),
        (None, None) => "unknown".to_string(),
    };
    match row.season {
        Some(season) => format!("S{} {}", season, name),
        None => name,
    }
}

/// Two decimals, with whole amounts shortened to `4-`.
pub fn format_price(price: f64) -> String {
    let formatted = format!("{:.2}", price);
    match formatted.strip_suffix(".00") {
        Some(whole) => format!("{}-", whole),
        None => formatted,
    }
}

/// `DD/MM/YY` in UTC.
pub fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|time| time.format("%d/%m/%y").to_string())
        .unwrap_or_else(|| "??/??/??".to_string())
}

fn capitalize_kind(kind: TransferKind) -> &'static str {
    match kind {
        TransferKind::Trades => "Trades",
        TransferKind::Gifts => "Gifts",
    }
}

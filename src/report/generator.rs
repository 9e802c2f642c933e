//! Markdown and JSON tally reports.
//!
//! This module turns ranked tally groups into a [`TallyReport`] and
//! renders it for the terminal or a file.

use crate::analysis::total_count;
use crate::identity::canonicalize;
use crate::index::Snapshot;
use crate::models::{ReportMetadata, ReportRow, TallyGroup, TallyMode, TallyReport};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Options controlling which rows and markers a report carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Maximum rows kept; all when unset.
    pub limit: Option<usize>,
    /// Check each row against the membership list.
    pub show_membership: bool,
    /// In name mode, show the alias-table master of each row.
    pub show_masters: bool,
}

/// Build a report from sorted `groups`.
///
/// Membership and master lookups go through `snapshot`; without one the
/// rows carry neither marker.
pub fn build_report(
    mut metadata: ReportMetadata,
    groups: &[TallyGroup],
    options: ReportOptions,
    snapshot: Option<&Snapshot>,
) -> TallyReport {
    metadata.total_count = total_count(groups);
    metadata.group_count = groups.len();
    metadata.snapshot_built_at = snapshot.map(|s| s.built_at);

    let mode = metadata.mode;
    let keep = options.limit.unwrap_or(groups.len());
    let rows = groups
        .iter()
        .take(keep)
        .enumerate()
        .map(|(i, group)| {
            let identity = match mode {
                TallyMode::Alias => &group.canonical_id,
                TallyMode::Name => &group.display_id,
            };

            let current = snapshot
                .filter(|_| options.show_membership)
                .map(|s| s.membership.contains(identity));

            let master = snapshot
                .filter(|_| options.show_masters && mode == TallyMode::Name)
                .and_then(|s| s.aliases.get(&canonicalize(identity)))
                .map(|entry| entry.master_id.clone())
                .filter(|master| *master != canonicalize(identity));

            ReportRow {
                rank: i + 1,
                display_id: group.display_id.clone(),
                canonical_id: group.canonical_id.clone(),
                count: group.count,
                alias_count: group.alias_count(),
                master,
                current,
            }
        })
        .collect();

    TallyReport { metadata, rows }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &TallyReport) -> String {
    let mut output = String::new();

    output.push_str(&generate_header(&report.metadata));
    output.push_str(&generate_rows_section(report));
    output.push_str(&generate_footer(&report.metadata));

    output
}

/// Title line and run details.
fn generate_header(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "# {}s of {} ({})\n\n",
        capitalize(metadata.role.as_str()),
        metadata.nation,
        format_large_number(metadata.total_count)
    ));
    section.push_str(&format!("- **Transfers:** {}\n", metadata.kind));
    section.push_str(&format!("- **Grouping:** {}\n", metadata.mode));
    section.push_str(&format!("- **Identities:** {}\n", metadata.group_count));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        format_time(metadata.generated_at)
    ));
    if let Some(built_at) = metadata.snapshot_built_at {
        section.push_str(&format!("- **Alias data from:** {}\n", format_time(built_at)));
    }
    section.push('\n');

    section
}

fn generate_rows_section(report: &TallyReport) -> String {
    let mut section = String::new();

    if report.rows.is_empty() {
        section.push_str("No matching transfers were found.\n\n");
        return section;
    }

    section.push_str("| # | Nation | Count |\n");
    section.push_str("|---:|:---|---:|\n");
    for row in &report.rows {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            row.rank,
            row_label(row),
            row.count
        ));
    }
    section.push('\n');

    if report.rows.len() < report.metadata.group_count {
        section.push_str(&format!(
            "*Showing {} of {} identities.*\n\n",
            report.rows.len(),
            report.metadata.group_count
        ));
    }

    section
}

/// Display id plus its master and markers.
fn row_label(row: &ReportRow) -> String {
    let mut label = row.display_id.clone();
    if let Some(ref master) = row.master {
        label.push_str(&format!(" ({})", master));
    }
    if row.alias_count > 1 {
        label.push_str(&format!(" [{}]", row.alias_count));
    }
    if row.current == Some(false) {
        label.push_str(" *(not current)*");
    }
    label
}

fn generate_footer(metadata: &ReportMetadata) -> String {
    format!(
        "---\n\n*{} {} counted. Report generated by unsmurf {}*\n",
        metadata.total_count,
        metadata.kind,
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &TallyReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Compact count: `12K` above ten thousand, `1.5K` above one thousand.
pub fn format_large_number(value: usize) -> String {
    if value > 10_000 {
        format!("{}K", value / 1000)
    } else if value > 1000 {
        format!("{:.1}K", value as f64 / 1000.0)
    } else {
        value.to_string()
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

//! Trade tallies by resolved identity.
//!
//! This module folds trade records into one group per canonical identity
//! and ranks the groups by how many records they hold.

use crate::identity::{canonicalize, normalize_name};
use crate::index::AliasIndex;
use crate::models::{Role, TallyGroup, TallyMode, TradeRecord, TransferKind};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

#[derive(Default)]
struct Accumulator {
    count: usize,
    raw_labels: BTreeSet<String>,
}

/// Group `records` by the canonical identity found in their `role` field.
///
/// Records rejected by `price_filter` or with an empty label are skipped.
/// Rows come back sorted by count (highest first), ties broken by display
/// id ascending.
pub fn aggregate<F>(
    records: &[TradeRecord],
    role: Role,
    price_filter: F,
    mode: TallyMode,
    aliases: &AliasIndex,
) -> Vec<TallyGroup>
where
    F: Fn(&TradeRecord) -> bool,
{
    let mut groups: HashMap<String, Accumulator> = HashMap::new();

    for record in records.iter().filter(|r| price_filter(r)) {
        let Some(raw) = record.label(role) else {
            continue;
        };

        let canonical = match mode {
            TallyMode::Alias => aliases.resolve(&canonicalize(raw)).master_id,
            TallyMode::Name => normalize_name(raw),
        };

        let group = groups.entry(canonical).or_default();
        group.count += 1;
        group.raw_labels.insert(raw.to_string());
    }

    let mut rows: Vec<TallyGroup> = groups
        .into_iter()
        .map(|(canonical_id, acc)| {
            let display_id = match mode {
                TallyMode::Alias => canonical_id.clone(),
                TallyMode::Name => smallest_label(&acc.raw_labels)
                    .unwrap_or(&canonical_id)
                    .to_string(),
            };

            TallyGroup {
                canonical_id,
                display_id,
                contributing_aliases: acc.raw_labels,
                count: acc.count,
            }
        })
        .collect();

    sort_groups(&mut rows);
    debug!("Tallied {} records into {} groups", records.len(), rows.len());

    rows
}

/// [`aggregate`] with the standard trade/gift price filter.
pub fn tally(
    records: &[TradeRecord],
    role: Role,
    kind: TransferKind,
    mode: TallyMode,
    aliases: &AliasIndex,
) -> Vec<TallyGroup> {
    aggregate(records, role, |r| kind.matches(r), mode, aliases)
}

/// Case-insensitive minimum; exact comparison breaks case-only ties.
fn smallest_label(labels: &BTreeSet<String>) -> Option<&String> {
    labels
        .iter()
        .min_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)))
}

/// Sort by count descending, then display id ascending.
pub fn sort_groups(groups: &mut [TallyGroup]) {
    groups.sort_by(|a, b| match b.count.cmp(&a.count) {
        Ordering::Equal => a
            .display_id
            .cmp(&b.display_id)
            .then_with(|| a.canonical_id.cmp(&b.canonical_id)),
        other => other,
    });
}

/// Sum of all group counts.
pub fn total_count(groups: &[TallyGroup]) -> usize {
    groups.iter().map(|g| g.count).sum()
}

/// Groups that folded more than one raw label together.
pub fn merged_groups(groups: &[TallyGroup]) -> usize {
    groups.iter().filter(|g| g.alias_count() > 1).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AliasRow;

    fn trade(buyer: &str, price: f64) -> TradeRecord {
        TradeRecord {
            buyer: Some(buyer.to_string()),
            seller: Some("testlandia".to_string()),
            price,
            timestamp: 1_700_000_000,
            ..Default::default()
        }
    }

    fn aliases() -> AliasIndex {
        AliasIndex::build(vec![
            AliasRow::from_raw("farm_a", "big_master", "9003").unwrap(),
            AliasRow::from_raw("farm_b", "big_master", "9003").unwrap(),
            AliasRow::from_raw("big_master", "big_master", "9003").unwrap(),
        ])
    }

    #[test]
    fn test_name_mode_groups_numbered_labels() {
        let records = vec![trade("foo_1", 5.0), trade("foo_2", 5.0), trade("bar", 0.0)];

        let rows = aggregate(&records, Role::Buyer, |r| r.price != 0.0, TallyMode::Name, &AliasIndex::default());

        assert_eq!(rows.len(), 1);
        let group = &rows[0];
        assert_eq!(group.canonical_id, "foo_@");
        assert_eq!(group.display_id, "foo_1");
        assert_eq!(group.count, 2);
        let expected: BTreeSet<String> = ["foo_1", "foo_2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(group.contributing_aliases, expected);
    }

    #[test]
    fn test_gifts_filter() {
        let records = vec![trade("foo_1", 5.0), trade("bar", 0.0)];
        let rows = tally(&records, Role::Buyer, TransferKind::Gifts, TallyMode::Name, &AliasIndex::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display_id, "bar");
    }

    #[test]
    fn test_alias_mode_resolves_masters() {
        let records = vec![
            trade("Farm A", 1.0),
            trade("farm_b", 1.0),
            trade("big_master", 1.0),
            trade("stranger", 1.0),
        ];

        let rows = tally(&records, Role::Buyer, TransferKind::Trades, TallyMode::Alias, &aliases());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].canonical_id, "big_master");
        assert_eq!(rows[0].display_id, "big_master");
        assert_eq!(rows[0].count, 3);
        assert_eq!(rows[0].alias_count(), 3);
        assert!(rows[0].contributing_aliases.contains("Farm A"));
        assert_eq!(rows[1].display_id, "stranger");
        assert_eq!(merged_groups(&rows), 1);
        assert_eq!(total_count(&rows), 4);
    }

    #[test]
    fn test_empty_labels_skipped() {
        let mut blank = trade("", 1.0);
        blank.buyer = None;
        let records = vec![blank, trade("  ", 1.0), trade("solo", 1.0)];
        let rows = tally(&records, Role::Buyer, TransferKind::Trades, TallyMode::Name, &AliasIndex::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
    }

    #[test]
    fn test_ties_sorted_by_display_id() {
        let records = vec![
            trade("zulu", 1.0),
            trade("alpha", 1.0),
            trade("mike", 1.0),
            trade("mike", 1.0),
        ];

        for _ in 0..5 {
            let rows = tally(&records, Role::Buyer, TransferKind::Trades, TallyMode::Name, &AliasIndex::default());
            let order: Vec<&str> = rows.iter().map(|r| r.display_id.as_str()).collect();
            assert_eq!(order, vec!["mike", "alpha", "zulu"]);
        }
    }

    #[test]
    fn test_display_id_case_insensitive_minimum() {
        let records = vec![trade("farm_CD", 1.0), trade("farm_ab", 1.0), trade("other", 1.0)];
        let rows = tally(&records, Role::Buyer, TransferKind::Trades, TallyMode::Name, &AliasIndex::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].canonical_id, "farm_@@");
        assert_eq!(rows[0].display_id, "farm_ab");
    }

    #[test]
    fn test_seller_role() {
        let records = vec![trade("x", 1.0), trade("y", 1.0)];
        let rows = tally(&records, Role::Seller, TransferKind::Trades, TallyMode::Alias, &AliasIndex::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display_id, "testlandia");
        assert_eq!(rows[0].count, 2);
    }
}

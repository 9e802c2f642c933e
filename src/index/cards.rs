//! Card id -> name fallback table.
//!
//! Some trade records arrive without a card name (season 4 cards in
//! particular). A two-column `id\tname` table fills the gap.

use crate::identity::canonicalize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CardNames {
    names: HashMap<u64, String>,
}

impl CardNames {
    /// Build from parsed rows of `(card id, card name)`.
    ///
    /// Rows with a non-numeric id or an empty name are skipped; a repeated
    /// id keeps its last name.
    pub fn load(rows: &[Vec<String>]) -> Self {
        let mut names = HashMap::with_capacity(rows.len());
        let mut skipped = 0usize;

        for columns in rows {
            let id = columns.first().and_then(|c| c.trim().parse::<u64>().ok());
            let name = columns.get(1).map(|c| canonicalize(c)).filter(|n| !n.is_empty());

            match (id, name) {
                (Some(id), Some(name)) => {
                    names.insert(id, name);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} malformed card name rows", skipped);
        }

        Self { names }
    }

    pub fn get(&self, card_id: u64) -> Option<&str> {
        self.names.get(&card_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_load_and_lookup() {
        let cards = CardNames::load(&rows(&[
            &["12", "The Grand Duchy"],
            &["x", "bad id"],
            &["13", "  "],
            &["14"],
            &["12", "Renamed Nation"],
        ]));

        assert_eq!(cards.len(), 1);
        assert_eq!(cards.get(12), Some("renamed_nation"));
        assert_eq!(cards.get(13), None);
    }

    #[test]
    fn test_empty_table() {
        let cards = CardNames::default();
        assert!(cards.is_empty());
        assert_eq!(cards.get(1), None);
    }
}

//! Puppet -> master alias index.
//!
//! Built wholesale from alias rows and never mutated afterwards; a refresh
//! builds a new index and the cache manager swaps it in.

use crate::identity::canonicalize;
use crate::models::AliasRow;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Forward-map value: where a puppet points and which table said so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasEntry {
    pub master_id: String,
    /// `None` when the identity was not found in any table.
    pub source_tag: Option<String>,
}

/// Forward (puppet -> master) and reverse (master -> puppets) lookups.
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    forward: HashMap<String, AliasEntry>,
    reverse: HashMap<String, Vec<String>>,
}

impl AliasIndex {
    /// Build an index from rows in source order.
    ///
    /// Rows with an empty puppet or master are skipped. When a puppet
    /// appears more than once the last row wins, and the puppet is moved
    /// out of the reverse list of the master it previously pointed to.
    /// Self-mappings (`puppet == master`) never produce a reverse entry.
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = AliasRow>,
    {
        let mut index = Self::default();
        let mut skipped = 0usize;

        for row in rows {
            let puppet = canonicalize(&row.puppet_id);
            let master = canonicalize(&row.master_id);
            if puppet.is_empty() || master.is_empty() {
                skipped += 1;
                continue;
            }

            let tag = Some(row.source_tag).filter(|t| !t.is_empty());
            let previous = index.forward.insert(
                puppet.clone(),
                AliasEntry {
                    master_id: master.clone(),
                    source_tag: tag,
                },
            );

            if let Some(previous) = previous {
                index.unlink(&previous.master_id, &puppet);
            }

            if puppet != master {
                index.reverse.entry(master).or_default().push(puppet);
            }
        }

        if skipped > 0 {
            debug!("Skipped {} malformed alias rows", skipped);
        }

        index
    }

    fn unlink(&mut self, master: &str, puppet: &str) {
        if let Some(puppets) = self.reverse.get_mut(master) {
            puppets.retain(|p| p != puppet);
            if puppets.is_empty() {
                self.reverse.remove(master);
            }
        }
    }

    /// Case-insensitive forward lookup.
    pub fn get(&self, puppet_id: &str) -> Option<&AliasEntry> {
        self.forward.get(&canonicalize(puppet_id))
    }

    /// Resolve a puppet to its master, falling back to the identity itself.
    pub fn resolve(&self, puppet_id: &str) -> AliasEntry {
        match self.get(puppet_id) {
            Some(entry) => entry.clone(),
            None => AliasEntry {
                master_id: puppet_id.to_string(),
                source_tag: None,
            },
        }
    }

    /// Puppets of `master_id`, in the order their rows were read.
    pub fn aliases_of(&self, master_id: &str) -> &[String] {
        self.reverse
            .get(&canonicalize(master_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn alias_count(&self, master_id: &str) -> usize {
        self.aliases_of(master_id).len()
    }

    /// Number of puppets in the forward map.
    pub fn puppet_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of masters with at least one true alias.
    pub fn master_count(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

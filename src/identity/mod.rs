//! Identity string handling.
//!
//! Field canonicalization used for every alias-table and membership
//! value, plus the numbering-scheme normalizer used by name-mode tallies.

pub mod normalizer;

pub use normalizer::{normalize_name, DIGIT_PLACEHOLDER, NUMERAL_PLACEHOLDER};

/// Canonical form of an identity field: trimmed, lowercased, with every
/// whitespace run replaced by a single underscore.
pub fn canonicalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;

    for ch in value.trim().chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
        } else {
            in_space = false;
            out.extend(ch.to_lowercase());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("  The Grand  Duchy\tof X "), "the_grand_duchy_of_x");
        assert_eq!(canonicalize("already_canonical"), "already_canonical");
        assert_eq!(canonicalize("   "), "");
    }
}

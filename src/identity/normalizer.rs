//! Numbering-scheme normalization.
//!
//! Labels that share a stem but differ in an embedded number are collapsed
//! into one shape, so `foo_1` and `foo_2` tally together as `foo_@`.
//! Three schemes are recognized: decimal digit runs, hexadecimal tokens and
//! Roman-numeral tokens. Exactly one candidate (the winner) is rewritten.

use regex::Regex;
use std::sync::LazyLock;

/// Replaces each digit of a decimal run or hexadecimal token.
pub const DIGIT_PLACEHOLDER: char = '@';

/// Replaces a whole Roman-numeral token.
pub const NUMERAL_PLACEHOLDER: char = '#';

/// A digit run; `_` and `-` may appear between digits without ending it.
static DECIMAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9](?:[0-9_-]*[0-9])?").expect("valid regex"));

static HEX_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]+$").expect("valid regex"));

/// Strict subtractive notation, 1..=4999. Also matches the empty string,
/// so callers check for emptiness first.
static ROMAN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^M{0,4}(?:CM|CD|D?C{0,3})(?:XC|XL|L?X{0,3})(?:IX|IV|V?I{0,3})$")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Decimal,
    Hex,
    Roman,
}

/// A byte range of the label selected for substitution.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    scheme: Scheme,
    start: usize,
    end: usize,
}

impl Candidate {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Collapses the embedded numbering scheme of `label`.
///
/// Returns the label unchanged when no candidate is found. Placeholders are
/// neither digits nor numerals, so the output is normally a fixed point;
/// the exception is a label with a second, losing candidate (`ab_12`).
pub fn normalize_name(label: &str) -> String {
    match select_candidate(label) {
        Some(candidate) => substitute(label, candidate),
        None => label.to_string(),
    }
}

fn select_candidate(label: &str) -> Option<Candidate> {
    let decimal = longest_decimal_run(label);

    let mut best: Option<Candidate> = None;
    for (start, token) in tokens(label) {
        let end = start + token.len();

        if HEX_TOKEN.is_match(token) {
            let replace = match best {
                None => true,
                Some(current) if current.scheme == Scheme::Roman => true,
                Some(current) => token.len() > current.len(),
            };
            if replace {
                best = Some(Candidate {
                    scheme: Scheme::Hex,
                    start,
                    end,
                });
            }
        } else if best.is_none() && ROMAN_TOKEN.is_match(token) {
            best = Some(Candidate {
                scheme: Scheme::Roman,
                start,
                end,
            });
        }
    }

    match (decimal, best) {
        (Some(d), Some(other)) if d.len() >= other.len() => Some(d),
        (Some(_), Some(other)) => Some(other),
        (Some(d), None) => Some(d),
        (None, other) => other,
    }
}

/// Longest decimal run; the first one wins among equal lengths.
fn longest_decimal_run(label: &str) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for m in DECIMAL_RUN.find_iter(label) {
        if best.map_or(true, |b| m.len() > b.len()) {
            best = Some(Candidate {
                scheme: Scheme::Decimal,
                start: m.start(),
                end: m.end(),
            });
        }
    }

    best
}

fn is_separator(ch: char) -> bool {
    ch == '_' || ch == '-' || ch.is_whitespace()
}

/// Splits a label into `(byte offset, token)` pairs.
///
/// Tokens break on separators. A word that is not entirely hex also
/// breaks on a lowercase-to-uppercase transition, so the trailing numeral
/// in `empireIX` is its own token while `DeadBeef` stays whole.
fn tokens(label: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();

    for (start, word) in words(label) {
        if HEX_TOKEN.is_match(word) {
            out.push((start, word));
        } else {
            split_case_transitions(start, word, &mut out);
        }
    }

    out
}

/// Separator-delimited words with their byte offsets.
fn words(label: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;

    for (i, ch) in label.char_indices() {
        if is_separator(ch) {
            if let Some(s) = start.take() {
                out.push((s, &label[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        out.push((s, &label[s..]));
    }

    out
}

fn split_case_transitions<'a>(offset: usize, word: &'a str, out: &mut Vec<(usize, &'a str)>) {
    let mut start = 0;
    let mut prev_lower = false;

    for (i, ch) in word.char_indices() {
        if prev_lower && ch.is_uppercase() {
            out.push((offset + start, &word[start..i]));
            start = i;
        }
        prev_lower = ch.is_lowercase();
    }

    out.push((offset + start, &word[start..]));
}

fn substitute(label: &str, candidate: Candidate) -> String {
    let (head, rest) = label.split_at(candidate.start);
    let (matched, tail) = rest.split_at(candidate.len());

    let replaced: String = match candidate.scheme {
        Scheme::Decimal => matched
            .chars()
            .map(|c| if c.is_ascii_digit() { DIGIT_PLACEHOLDER } else { c })
            .collect(),
        Scheme::Hex => matched
            .chars()
            .map(|c| if c.is_ascii_hexdigit() { DIGIT_PLACEHOLDER } else { c })
            .collect(),
        Scheme::Roman => NUMERAL_PLACEHOLDER.to_string(),
    };

    let mut out = String::with_capacity(label.len());
    out.push_str(head);
    out.push_str(&replaced);
    out.push_str(tail);
    out
}

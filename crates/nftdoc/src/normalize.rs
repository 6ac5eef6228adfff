//! Comparison helpers for documents read back from the kernel.

use crate::config::{Config, Entry};
use crate::error::Result;
use similar::TextDiff;

/// Strips volatile fields and puts entries in a stable order.
///
/// The leading metainfo entry is dropped, rule handles and indexes and
/// counter handles are cleared, and implicit-add entries are sorted as
/// tables, chains, counters, rules. Explicit-verb entries follow in their
/// original order, then entries of unmodelled kinds.
pub fn normalize(config: &mut Config) {
    if matches!(config.nftables.first(), Some(Entry::Metainfo(_))) {
        config.nftables.remove(0);
    }

    for entry in &mut config.nftables {
        match entry {
            Entry::Rule(rule) => {
                rule.handle = None;
                rule.index = None;
            }
            Entry::Counter(counter) => counter.handle = None,
            _ => {}
        }
    }

    config.nftables.sort_by_key(rank);
}

fn rank(entry: &Entry) -> u8 {
    match entry {
        Entry::Table(_) => 0,
        Entry::Chain(_) => 1,
        Entry::Counter(_) => 2,
        Entry::Rule(_) => 3,
        Entry::Raw(_) => 5,
        _ => 4,
    }
}

/// Unified diff (hunks with three lines of context) of the normalized,
/// pretty-printed documents, headed `--- actual` / `+++ desired`.
///
/// `None` when they are equal.
pub fn diff(desired: &Config, actual: &Config) -> Result<Option<String>> {
    let desired = normalized_text(desired)?;
    let actual = normalized_text(actual)?;

    if desired == actual {
        return Ok(None);
    }
    Ok(Some(render_hunks(&actual, &desired)))
}

fn normalized_text(config: &Config) -> Result<String> {
    let mut config = config.clone();
    normalize(&mut config);
    let mut text = config.to_json_pretty()?;
    text.push('\n');
    Ok(text)
}

fn render_hunks(actual: &str, desired: &str) -> String {
    TextDiff::from_lines(actual, desired)
        .unified_diff()
        .context_radius(3)
        .header("actual", "desired")
        .to_string()
}

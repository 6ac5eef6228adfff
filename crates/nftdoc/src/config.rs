//! The document: an ordered log of nftables operations and its JSON form.

use crate::error::{Error, Result};
use nftdoc_schema::{Chain, Metainfo, NamedCounter, RawJson, Rule, Table};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use tracing::debug;

/// Marker for `flush ruleset`; encodes as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset;

/// Object wrapped by an explicit `add`, `delete` or `flush` verb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Object {
    Table(Table),
    Chain(Chain),
    Rule(Rule),
    Counter(NamedCounter),
    Ruleset(Ruleset),
}

/// One element of the `nftables` array.
///
/// The bare `table`/`chain`/`rule`/`counter` forms carry an implicit add
/// verb and are the only entries lookups search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entry {
    Table(Table),
    Chain(Chain),
    Rule(Rule),
    Counter(NamedCounter),
    Add(Object),
    Delete(Object),
    Flush(Object),
    /// Emitted by `nft` on read-back, never built by callers.
    Metainfo(Metainfo),
    /// Entry kinds not modelled here (`set`, `map`, `flowtable`, ...),
    /// kept verbatim.
    #[serde(untagged)]
    Raw(RawJson),
}

impl Entry {
    pub fn is_implicit_add(&self) -> bool {
        matches!(
            self,
            Self::Table(_) | Self::Chain(_) | Self::Rule(_) | Self::Counter(_)
        )
    }
}

const OBJECT_KEYS: [&str; 5] = ["table", "chain", "rule", "counter", "ruleset"];

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let verbatim = || Self::Raw(RawJson::from(raw.clone()));

        let Some((key, value)) = single_key(&raw) else {
            return Ok(verbatim());
        };
        let decoded = decode_entry(&key, value).map_err(de::Error::custom)?;
        Ok(decoded.unwrap_or_else(verbatim))
    }
}

/// Decodes the value under `key`. `Ok(None)` for entry kinds, or verb
/// targets, that are not modelled.
fn decode_entry(key: &str, value: &RawValue) -> serde_json::Result<Option<Entry>> {
    let json = value.get();
    let entry = match key {
        "table" => Entry::Table(serde_json::from_str(json)?),
        "chain" => Entry::Chain(serde_json::from_str(json)?),
        "rule" => Entry::Rule(serde_json::from_str(json)?),
        "counter" => Entry::Counter(serde_json::from_str(json)?),
        "metainfo" => Entry::Metainfo(serde_json::from_str(json)?),
        "add" | "delete" | "flush" => {
            let known = single_key(value)
                .is_some_and(|(kind, _)| OBJECT_KEYS.contains(&kind.as_str()));
            if !known {
                return Ok(None);
            }
            let object = serde_json::from_str(json)?;
            match key {
                "add" => Entry::Add(object),
                "delete" => Entry::Delete(object),
                _ => Entry::Flush(object),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(entry))
}

/// The sole key of a JSON object and its value; `None` for anything else.
fn single_key(raw: &RawValue) -> Option<(String, &RawValue)> {
    let keys: BTreeMap<String, &RawValue> = serde_json::from_str(raw.get()).ok()?;
    let mut entries = keys.into_iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Some(entry),
        _ => None,
    }
}

/// `{"nftables": [...]}`
///
/// Entries are applied in order. Mutations only ever append; use the
/// lookup methods to edit an entry already in the log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub(crate) nftables: Vec<Entry>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.nftables
    }

    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.nftables
    }

    pub fn push(&mut self, entry: Entry) {
        self.nftables.push(entry);
    }

    pub fn len(&self) -> usize {
        self.nftables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nftables.is_empty()
    }

    /// Leading metainfo entry of a document read back from `nft`.
    pub fn metainfo(&self) -> Option<&Metainfo> {
        match self.nftables.first() {
            Some(Entry::Metainfo(info)) => Some(info),
            _ => None,
        }
    }

    pub fn add_table(&mut self, table: Table) {
        self.push(Entry::Table(table));
    }

    pub fn delete_table(&mut self, table: Table) {
        self.push(Entry::Delete(Object::Table(table)));
    }

    pub fn flush_table(&mut self, table: Table) {
        self.push(Entry::Flush(Object::Table(table)));
    }

    pub fn add_chain(&mut self, chain: Chain) {
        self.push(Entry::Chain(chain));
    }

    pub fn delete_chain(&mut self, chain: Chain) {
        self.push(Entry::Delete(Object::Chain(chain)));
    }

    pub fn flush_chain(&mut self, chain: Chain) {
        self.push(Entry::Flush(Object::Chain(chain)));
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.push(Entry::Rule(rule));
    }

    /// The rule must carry the kernel-assigned `handle`.
    pub fn delete_rule(&mut self, rule: Rule) {
        self.push(Entry::Delete(Object::Rule(rule)));
    }

    pub fn add_counter(&mut self, counter: NamedCounter) {
        self.push(Entry::Counter(counter));
    }

    pub fn delete_counter(&mut self, counter: NamedCounter) {
        self.push(Entry::Delete(Object::Counter(counter)));
    }

    pub fn flush_ruleset(&mut self) {
        self.push(Entry::Flush(Object::Ruleset(Ruleset)));
    }

    /// Compact JSON, ready for `nft -j -f -`.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data).map_err(Error::decode)?;
        debug!(entries = config.len(), "decoded nftables document");
        Ok(config)
    }
}

impl From<Vec<Entry>> for Config {
    fn from(nftables: Vec<Entry>) -> Self {
        Self { nftables }
    }
}

impl FromIterator<Entry> for Config {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self {
            nftables: iter.into_iter().collect(),
        }
    }
}

impl Extend<Entry> for Config {
    fn extend<I: IntoIterator<Item = Entry>>(&mut self, iter: I) {
        self.nftables.extend(iter);
    }
}

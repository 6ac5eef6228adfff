//! Partial-match search over the implicit-add entries of a [`Config`].
//!
//! Unset pattern fields (and empty names) match anything. Returned
//! references point into the document, so edits through the `_mut`
//! variants change the document in place.

use crate::config::{Config, Entry};
use nftdoc_schema::{Chain, NamedCounter, Rule, Statement, Table};

impl Config {
    pub fn lookup_table(&self, pattern: &Table) -> Option<&Table> {
        self.nftables.iter().find_map(|entry| match entry {
            Entry::Table(table) if table_matches(pattern, table) => Some(table),
            _ => None,
        })
    }

    pub fn lookup_table_mut(&mut self, pattern: &Table) -> Option<&mut Table> {
        self.nftables.iter_mut().find_map(|entry| match entry {
            Entry::Table(table) if table_matches(pattern, table) => Some(table),
            _ => None,
        })
    }

    pub fn lookup_chain(&self, pattern: &Chain) -> Option<&Chain> {
        self.nftables.iter().find_map(|entry| match entry {
            Entry::Chain(chain) if chain_matches(pattern, chain) => Some(chain),
            _ => None,
        })
    }

    pub fn lookup_chain_mut(&mut self, pattern: &Chain) -> Option<&mut Chain> {
        self.nftables.iter_mut().find_map(|entry| match entry {
            Entry::Chain(chain) if chain_matches(pattern, chain) => Some(chain),
            _ => None,
        })
    }

    pub fn lookup_counter(&self, pattern: &NamedCounter) -> Option<&NamedCounter> {
        self.nftables.iter().find_map(|entry| match entry {
            Entry::Counter(counter) if counter_matches(pattern, counter) => Some(counter),
            _ => None,
        })
    }

    pub fn lookup_counter_mut(&mut self, pattern: &NamedCounter) -> Option<&mut NamedCounter> {
        self.nftables.iter_mut().find_map(|entry| match entry {
            Entry::Counter(counter) if counter_matches(pattern, counter) => Some(counter),
            _ => None,
        })
    }

    /// All matching rules, in document order.
    pub fn lookup_rule(&self, pattern: &Rule) -> Vec<&Rule> {
        self.nftables
            .iter()
            .filter_map(|entry| match entry {
                Entry::Rule(rule) if rule_matches(pattern, rule) => Some(rule),
                _ => None,
            })
            .collect()
    }

    pub fn lookup_rule_mut(&mut self, pattern: &Rule) -> Vec<&mut Rule> {
        self.nftables
            .iter_mut()
            .filter_map(|entry| match entry {
                Entry::Rule(rule) if rule_matches(pattern, rule) => Some(rule),
                _ => None,
            })
            .collect()
    }
}

fn table_matches(pattern: &Table, table: &Table) -> bool {
    table.family == pattern.family && name_matches(&pattern.name, &table.name)
}

fn chain_matches(pattern: &Chain, chain: &Chain) -> bool {
    chain.family == pattern.family
        && chain.table == pattern.table
        && name_matches(&pattern.name, &chain.name)
        && field_matches(&pattern.chain_type, &chain.chain_type)
        && field_matches(&pattern.hook, &chain.hook)
        && field_matches(&pattern.priority, &chain.priority)
        && field_matches(&pattern.policy, &chain.policy)
}

fn counter_matches(pattern: &NamedCounter, counter: &NamedCounter) -> bool {
    counter.family == pattern.family
        && counter.table == pattern.table
        && counter.name == pattern.name
        && field_matches(&pattern.handle, &counter.handle)
}

fn rule_matches(pattern: &Rule, rule: &Rule) -> bool {
    rule.family == pattern.family
        && rule.table == pattern.table
        && rule.chain == pattern.chain
        && field_matches(&pattern.handle, &rule.handle)
        && field_matches(&pattern.index, &rule.index)
        && name_matches(
            pattern.comment.as_deref().unwrap_or_default(),
            rule.comment.as_deref().unwrap_or_default(),
        )
        && (pattern.statements.is_empty()
            || statements_equal(&pattern.statements, &rule.statements))
}

fn name_matches(pattern: &str, candidate: &str) -> bool {
    pattern.is_empty() || pattern == candidate
}

fn field_matches<T: PartialEq>(pattern: &Option<T>, candidate: &Option<T>) -> bool {
    pattern.as_ref().is_none_or(|p| candidate.as_ref() == Some(p))
}

// Statements compare by their encoding; the encoder is deterministic
// (fixed field order, raw fragments kept verbatim).
fn statements_equal(pattern: &[Statement], candidate: &[Statement]) -> bool {
    pattern.len() == candidate.len()
        && pattern
            .iter()
            .zip(candidate)
            .all(|(a, b)| match (serde_json::to_vec(a), serde_json::to_vec(b)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftdoc_schema::{ChainHook, ChainPolicy, ChainType, Expression, Family, Operator};

    fn empty_statement() -> Statement {
        Statement::Raw(nftdoc_schema::RawJson::parse("{}").unwrap())
    }

    struct Fixture {
        config: Config,
        table: Table,
        chain: Chain,
    }

    fn fixture() -> Fixture {
        let table = Table::new("table-name", Family::Ip);
        let chain = Chain::regular(&table, "chain-name");

        let mut config = Config::new();
        config.add_table(table.clone());
        config.add_chain(chain.clone());
        config.add_rule(Rule::new(&table, &chain, vec![], None, None, None));
        config.add_rule(Rule::new(&table, &chain, vec![Statement::drop()], None, None, None));
        config.add_rule(Rule::new(
            &table,
            &chain,
            vec![empty_statement(), empty_statement()],
            Some(123),
            Some(1),
            Some("test"),
        ));

        Fixture {
            config,
            table,
            chain,
        }
    }

    #[test]
    fn table_lookup_checks_family_and_name() {
        let Fixture { config, table, .. } = fixture();

        assert_eq!(config.lookup_table(&table), Some(&table));
        assert_eq!(
            config.lookup_table(&Table::new("", Family::Ip)),
            Some(&table)
        );
        assert!(config.lookup_table(&Table::new("table-name", Family::Ip6)).is_none());
        assert!(config.lookup_table(&Table::new("other", Family::Ip)).is_none());
    }

    #[test]
    fn chain_lookup_checks_base_fields_when_set() {
        let table = Table::new("filter", Family::Inet);
        let base = Chain::new(
            &table,
            "input",
            Some(ChainType::Filter),
            Some(ChainHook::Input),
            Some(0),
            Some(ChainPolicy::Drop),
        );
        let mut config = Config::new();
        config.add_chain(Chain::regular(&table, "allowed"));
        config.add_chain(base.clone());

        let mut pattern = Chain::regular(&table, "");
        pattern.hook = Some(ChainHook::Input);
        assert_eq!(config.lookup_chain(&pattern), Some(&base));

        pattern.policy = Some(ChainPolicy::Accept);
        assert!(config.lookup_chain(&pattern).is_none());

        let mut other_table = Chain::regular(&table, "input");
        other_table.table = "nat".into();
        assert!(config.lookup_chain(&other_table).is_none());
    }

    #[test]
    fn counter_lookup_requires_name() {
        let table = Table::new("t", Family::Netdev);
        let mut config = Config::new();
        config.add_counter(NamedCounter::new(&table, "hits"));

        assert!(config.lookup_counter(&NamedCounter::new(&table, "hits")).is_some());
        assert!(config.lookup_counter(&NamedCounter::new(&table, "")).is_none());

        let mut with_handle = NamedCounter::new(&table, "hits");
        with_handle.handle = Some(9);
        assert!(config.lookup_counter(&with_handle).is_none());
    }

    #[test]
    fn rule_lookup() {
        let Fixture {
            config,
            table,
            chain,
        } = fixture();
        let rule = |statements, handle, index, comment| {
            Rule::new(&table, &chain, statements, handle, index, comment)
        };

        let cases = [
            ("match all", rule(vec![], None, None, None), 3),
            (
                "match by statement",
                rule(vec![Statement::drop()], None, None, None),
                1,
            ),
            (
                "match by all params",
                rule(
                    vec![empty_statement(), empty_statement()],
                    Some(123),
                    Some(1),
                    Some("test"),
                ),
                1,
            ),
            ("match by handle", rule(vec![], Some(123), None, None), 1),
            ("match by index", rule(vec![], None, Some(1), None), 1),
            ("match by comment", rule(vec![], None, None, Some("test")), 1),
            ("empty comment is a wildcard", rule(vec![], None, None, Some("")), 3),
            ("no match by handle", rule(vec![], Some(321), None, None), 0),
            ("no match by index", rule(vec![], None, Some(2), None), 0),
            (
                "no match by comment",
                rule(vec![], None, None, Some("foo")),
                0,
            ),
            (
                "no match by statement",
                rule(vec![Statement::accept()], None, None, None),
                0,
            ),
            (
                "no match by statement count",
                rule(vec![empty_statement()], Some(123), None, None),
                0,
            ),
        ];

        for (name, pattern, expected) in cases {
            assert_eq!(config.lookup_rule(&pattern).len(), expected, "{name}");
        }
    }

    #[test]
    fn rule_lookup_keeps_identity_fields_mandatory() {
        let Fixture { config, table, .. } = fixture();
        let other_chain = Chain::regular(&table, "other");
        let pattern = Rule::new(&table, &other_chain, vec![], None, None, None);
        assert!(config.lookup_rule(&pattern).is_empty());

        let other_family = Table::new("table-name", Family::Ip6);
        let pattern = Rule::new(
            &other_family,
            &Chain::regular(&other_family, "chain-name"),
            vec![],
            None,
            None,
            None,
        );
        assert!(config.lookup_rule(&pattern).is_empty());
    }

    #[test]
    fn every_rule_is_found_by_its_identity() {
        let Fixture { config, .. } = fixture();
        for entry in config.entries() {
            if let Entry::Rule(rule) = entry {
                let mut pattern = rule.clone();
                pattern.statements.clear();
                pattern.handle = None;
                pattern.index = None;
                pattern.comment = None;
                assert!(config.lookup_rule(&pattern).contains(&rule));
            }
        }
    }

    #[test]
    fn statements_compare_by_encoding() {
        let table = Table::new("t", Family::Ip);
        let chain = Chain::regular(&table, "c");
        let mut config = Config::new();
        config.add_rule(Rule::new(
            &table,
            &chain,
            vec![Statement::matching(
                Operator::Eq,
                Expression::payload("tcp", "dport"),
                Expression::Float(22.0),
            )],
            None,
            None,
            None,
        ));

        let pattern = Rule::new(
            &table,
            &chain,
            vec![Statement::matching(
                Operator::Eq,
                Expression::payload("tcp", "dport"),
                Expression::Integer(22),
            )],
            None,
            None,
            None,
        );
        assert_eq!(config.lookup_rule(&pattern).len(), 1);
    }

    #[test]
    fn explicit_verb_entries_are_not_searched() {
        let table = Table::new("t", Family::Ip);
        let mut config = Config::new();
        config.delete_table(table.clone());
        config.flush_table(table.clone());
        assert!(config.lookup_table(&table).is_none());
    }

    #[test]
    fn unmodelled_entries_are_not_searched() {
        let config = Config::from_json(
            br#"{"nftables":[{"set":{"family":"ip","table":"t","name":"s"}},{"table":{"family":"ip","name":"t"}}]}"#,
        )
        .unwrap();
        let found = config.lookup_table(&Table::new("", Family::Ip));
        assert_eq!(found, Some(&Table::new("t", Family::Ip)));
    }

    #[test]
    fn mutable_lookup_edits_the_document() {
        let Fixture {
            mut config,
            table,
            chain,
        } = fixture();

        let pattern = Rule::new(&table, &chain, vec![], Some(123), None, None);
        for rule in config.lookup_rule_mut(&pattern) {
            rule.comment = Some("edited".into());
        }
        let edited = Rule::new(&table, &chain, vec![], None, None, Some("edited"));
        assert_eq!(config.lookup_rule(&edited).len(), 1);

        if let Some(found) = config.lookup_chain_mut(&chain) {
            found.policy = Some(ChainPolicy::Accept);
        }
        let mut accepting = chain.clone();
        accepting.policy = Some(ChainPolicy::Accept);
        assert!(config.lookup_chain(&accepting).is_some());

        if let Some(found) = config.lookup_table_mut(&table) {
            found.name = "renamed".into();
        }
        assert!(config.lookup_table(&Table::new("renamed", Family::Ip)).is_some());
    }
}

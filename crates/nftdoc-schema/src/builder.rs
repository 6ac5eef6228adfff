//! Constructors for the entity value types. They take everything
//! explicitly and never validate: a chain with a hook but no type is
//! accepted here and rejected by the kernel at apply time.

use crate::object::{
    Chain, ChainHook, ChainPolicy, ChainType, Family, NamedCounter, Rule, Table,
};
use crate::statement::Statement;

impl Table {
    pub fn new(name: &str, family: Family) -> Self {
        Self {
            family,
            name: name.to_string(),
        }
    }
}

impl Chain {
    /// A chain reachable only through jump/goto.
    pub fn regular(table: &Table, name: &str) -> Self {
        Self::new(table, name, None, None, None, None)
    }

    pub fn new(
        table: &Table,
        name: &str,
        chain_type: Option<ChainType>,
        hook: Option<ChainHook>,
        priority: Option<i32>,
        policy: Option<ChainPolicy>,
    ) -> Self {
        Self {
            family: table.family,
            table: table.name.clone(),
            name: name.to_string(),
            chain_type,
            hook,
            priority,
            policy,
        }
    }
}

impl Rule {
    pub fn new(
        table: &Table,
        chain: &Chain,
        statements: Vec<Statement>,
        handle: Option<u64>,
        index: Option<u32>,
        comment: Option<&str>,
    ) -> Self {
        Self {
            family: table.family,
            table: table.name.clone(),
            chain: chain.name.clone(),
            statements,
            handle,
            index,
            comment: comment.map(str::to_string),
        }
    }
}

impl NamedCounter {
    pub fn new(table: &Table, name: &str) -> Self {
        Self {
            family: table.family,
            table: table.name.clone(),
            name: name.to_string(),
            handle: None,
            packets: None,
            bytes: None,
        }
    }
}

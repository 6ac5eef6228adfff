//! Typed model of the nftables JSON exchange format: tables, chains, rules,
//! named counters, and the statement/expression union rules are made of.

pub mod builder;
pub mod expression;
pub mod object;
pub mod statement;

pub use expression::{Expression, Payload, RawJson, UNSUPPORTED_EXPRESSION};
pub use object::{
    Chain, ChainHook, ChainPolicy, ChainType, Family, Metainfo, NamedCounter, Rule, Table,
};
pub use statement::{
    Counter, JumpTarget, Match, Nat, NatFlag, NatFlags, Operator, PortMapping, Statement, Verdict,
};

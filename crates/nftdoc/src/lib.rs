//! In-memory nftables JSON documents: build, encode, read back and query.

pub mod config;
pub mod error;
pub mod index;
pub mod lookup;
pub mod normalize;

pub use config::{Config, Entry, Object, Ruleset};
pub use error::{Error, Result};
pub use index::RuleIndex;
pub use normalize::{diff, normalize};
pub use nftdoc_schema::*;

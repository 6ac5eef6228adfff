//! Boundary to the live system: hands nftables documents to `nft` and
//! reads them back.

pub mod error;
pub mod executor;
pub mod settings;

pub use error::ExecError;
pub use executor::{Executor, NftCommand, apply_config, apply_config_echo, read_config};
pub use settings::{DEFAULT_SETTINGS_PATH, Settings};

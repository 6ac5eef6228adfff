use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_SETTINGS_PATH: &str = "/etc/nftdoc/settings.yaml";

/// How the `nft` binary is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub binary: String,
    pub timeout_secs: u64,
    /// Inserted before the JSON-mode arguments, e.g. `["--numeric"]`.
    pub extra_args: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary: "nft".to_string(),
            timeout_secs: 30,
            extra_args: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Explicit path if given, else the system-wide file if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let system = Path::new(DEFAULT_SETTINGS_PATH);
        if system.exists() {
            return Self::from_file(system);
        }

        debug!("no settings file found, using defaults");
        Ok(Self::default())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

//! Configuration for the ledger binary

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory of the sled database
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// tracing filter used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Flush every commit to disk before reporting success
    #[serde(default)]
    pub flush_on_commit: bool,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("scf-ledger.db")
}

fn default_log_filter() -> String {
    "scf_ledger=info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            log_filter: default_log_filter(),
            flush_on_commit: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

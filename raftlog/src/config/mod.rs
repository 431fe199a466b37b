use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    error::{Error, Result},
    logger::parse_severity,
};
pub mod config_builder;

pub use config_builder::ConfigBuilder;

/// Where the diagnostics of the log core are written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDestination {
    #[default]
    Stderr,
    File {
        path: String,
    },
    /// Forward records to the `log` facade.
    StdLog,
    Discard,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Applied index to resume from. 0 means "derive it from storage".
    pub(crate) applied: u64,
    /// Byte cap of a single batch returned by `RaftLog::next_entries`.
    pub(crate) max_committed_size_per_ready: u64,
    pub(crate) log_level: String,
    pub(crate) log_destination: LogDestination,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            applied: 0,
            max_committed_size_per_ready: u64::MAX,
            log_level: String::from("info"),
            log_destination: LogDestination::Stderr,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if parse_severity(&self.log_level).is_none() {
            return Err(Error::ConfigInvalid(format!(
                "log_level should be one of trace, debug, info, warning, error, critical, got {}",
                self.log_level
            )));
        }

        if self.max_committed_size_per_ready == 0 {
            return Err(Error::ConfigInvalid(
                "max_committed_size_per_ready should be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn max_committed_size_per_ready(&self) -> u64 {
        self.max_committed_size_per_ready
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_destination(&self) -> &LogDestination {
        &self.log_destination
    }
}

//! Defines the configuration of the protocol engine.

use std::str::FromStr;

use ibc_classic_types::{
    connection::{compatible_versions, Version},
    path::CommitmentPrefix,
};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// The configuration of the protocol engine.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoreConfig {
    /// The prefix under which this chain commits its IBC state.
    #[serde(default)]
    pub commitment_prefix: CommitmentPrefix,
    /// The connection versions this chain supports, in preference order.
    #[serde(default = "compatible_versions")]
    pub connection_versions: Vec<Version>,
    /// Expected block time in nanoseconds.
    /// Used to derive the block delay from a connection's time delay.
    #[serde(default = "default_max_expected_time_per_block")]
    pub max_expected_time_per_block: u64,
    /// The log level for the engine.
    #[serde(default)]
    pub log_level: String,
}

/// Thirty seconds, in nanoseconds.
const fn default_max_expected_time_per_block() -> u64 {
    30_000_000_000
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            commitment_prefix: CommitmentPrefix::default(),
            connection_versions: compatible_versions(),
            max_expected_time_per_block: default_max_expected_time_per_block(),
            log_level: String::new(),
        }
    }
}

impl CoreConfig {
    /// Returns the log level for the engine.
    #[must_use]
    pub fn log_level(&self) -> Level {
        Level::from_str(&self.log_level).unwrap_or(Level::INFO)
    }

    /// Returns the number of blocks that must pass for a time delay of `delay_period`.
    #[must_use]
    pub const fn block_delay(&self, delay_period: u64) -> u64 {
        if self.max_expected_time_per_block == 0 {
            return 0;
        }
        delay_period.div_ceil(self.max_expected_time_per_block)
    }

    /// Checks the configuration for values the engine cannot work with.
    ///
    /// # Errors
    /// Returns an error if the prefix is empty, no version is supported, a version is
    /// malformed, or the expected block time is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.commitment_prefix.is_empty(),
            "commitment prefix cannot be empty"
        );
        anyhow::ensure!(
            !self.connection_versions.is_empty(),
            "at least one connection version must be supported"
        );
        for version in &self.connection_versions {
            version.validate()?;
        }
        anyhow::ensure!(
            self.max_expected_time_per_block > 0,
            "max_expected_time_per_block must be positive"
        );
        Ok(())
    }
}

/// Parse a configuration value into the target struct while producing
/// detailed path-aware error messages.
///
/// # Errors
/// Returns an [`anyhow::Error`] with the precise path and the original serde
/// error message.
pub fn parse_config<T>(value: serde_json::Value) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let json_string = value.to_string();

    let mut deserializer = serde_json::Deserializer::from_str(&json_string);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer)
        .map_err(|e| anyhow::anyhow!("config error at {}: {}", e.path(), e))
}

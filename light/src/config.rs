use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {0}: {1}")]
    Invalid(&'static str, String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Light client data-access configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub chain_id: u64,
    /// Upper bound of a single on-demand retrieval, in milliseconds
    pub odr_timeout_ms: u64,
    /// Number of blocks covered by one bloom index section
    pub bloom_section_size: u64,
    /// Worker count of every log search session
    pub bloom_filter_threads: usize,
    /// Capacity of the section work queue of every log search session
    pub bloom_queue_capacity: usize,
    pub header_cache_size: usize,
    pub receipt_cache_size: usize,
    pub state_cache_size: usize,
    /// Per-subscription notification buffer
    pub subscription_capacity: usize,
    /// Gas cap applied to read-only calls, `0` for none
    pub rpc_gas_cap: u64,
    /// Buffered logs of every log search result stream
    pub result_stream_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: 1,
            odr_timeout_ms: 10_000,
            bloom_section_size: 4096,
            bloom_filter_threads: 3,
            bloom_queue_capacity: 16,
            header_cache_size: 2048,
            receipt_cache_size: 256,
            state_cache_size: 1024,
            subscription_capacity: 128,
            rpc_gas_cap: 50_000_000,
            result_stream_capacity: 64,
        }
    }
}

impl Config {
    pub fn odr_timeout(&self) -> Duration {
        Duration::from_millis(self.odr_timeout_ms)
    }

    pub fn gas_cap(&self) -> Option<u64> {
        (self.rpc_gas_cap > 0).then_some(self.rpc_gas_cap)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let positive: [(&'static str, u64); 6] = [
            ("odr-timeout-ms", self.odr_timeout_ms),
            ("bloom-section-size", self.bloom_section_size),
            ("bloom-filter-threads", self.bloom_filter_threads as u64),
            ("bloom-queue-capacity", self.bloom_queue_capacity as u64),
            ("subscription-capacity", self.subscription_capacity as u64),
            ("result-stream-capacity", self.result_stream_capacity as u64),
        ];
        match positive.into_iter().find(|(_, value)| *value == 0) {
            Some((name, value)) => Err(ConfigError::Invalid(name, format!("{value} (must be positive)"))),
            None => Ok(()),
        }
    }

    /// Parses and validates a TOML config. Missing keys take their default value.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config() {
        let config = Config::from_toml_str(
            r#"
            chain-id = 5
            odr-timeout-ms = 250
            bloom-section-size = 10
            bloom-filter-threads = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.chain_id, 5);
        assert_eq!(config.odr_timeout(), Duration::from_millis(250));
        assert_eq!(config.bloom_section_size, 10);
        assert_eq!(config.bloom_filter_threads, 4);
        assert_eq!(config.subscription_capacity, Config::default().subscription_capacity);

        assert!(matches!(Config::from_toml_str("unknown-key = 1"), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::from_toml_str("bloom-section-size = 0"), Err(ConfigError::Invalid("bloom-section-size", _))));
        assert_eq!(Config { rpc_gas_cap: 0, ..Default::default() }.gas_cap(), None);
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lds.toml");
        std::fs::write(&path, "result-stream-capacity = 3\n").unwrap();
        assert_eq!(Config::from_toml_file(&path).unwrap().result_stream_capacity, 3);
        assert!(matches!(Config::from_toml_file(dir.path().join("missing.toml")), Err(ConfigError::Io(_))));
    }
}

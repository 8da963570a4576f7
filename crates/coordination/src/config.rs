use std::time::Duration;

use derive_more::derive::From;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::barrier::WaitStrategy;
use crate::transfer::BatchedTransfer;

#[derive(Debug, From)]
pub enum ConfigError {
    IOError(std::io::Error),

    DeserializationFailed(toml::de::Error),

    SerializationFailed(toml::ser::Error),

    #[from(ignore)]
    InvalidValue {
        key: &'static str,
        reason: &'static str,
    },
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, reason } => {
                write!(f, "ConfigError::InvalidValue({key}: {reason})")
            }
            _ => write!(f, "{self:?}"),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `from_path` reads a TOML file into any `serde::DeserializeOwned` type.
pub fn from_path<T, V>(target: V) -> ConfigResult<T>
where
    T: DeserializeOwned,
    V: Into<std::path::PathBuf>,
{
    let target_path = target.into();
    let config_content = std::fs::read_to_string(target_path)?;
    let config_obj: T = toml::from_str(&config_content)?;
    Ok(config_obj)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub total_items: u64,
    pub batch_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            total_items: 50_000,
            batch_size: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub chain_length: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { chain_length: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub exchanges: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self { exchanges: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Spin,
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    pub task_count: usize,
    pub strategy: StrategyKind,
    pub backoff_micros: u64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            task_count: 10,
            strategy: StrategyKind::Spin,
            backoff_micros: 1,
        }
    }
}

impl BarrierConfig {
    #[must_use]
    pub fn wait_strategy(&self) -> WaitStrategy {
        match self.strategy {
            StrategyKind::Spin => WaitStrategy::Spin {
                backoff: Duration::from_micros(self.backoff_micros),
            },
            StrategyKind::Blocking => WaitStrategy::Blocking,
        }
    }
}

/// `CoordinationConfig` holds the sizing parameters of every primitive.
///
/// Each section and key is optional in the TOML source and falls back to
/// its default.
///
/// ```toml
/// [queue]
/// capacity = 100
///
/// [transfer]
/// total_items = 50000
/// batch_size = 500
///
/// [relay]
/// chain_length = 100
///
/// [mailbox]
/// exchanges = 10
///
/// [barrier]
/// task_count = 10
/// strategy = "spin"
/// backoff_micros = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    pub queue: QueueConfig,
    pub transfer: TransferConfig,
    pub relay: RelayConfig,
    pub mailbox: MailboxConfig,
    pub barrier: BarrierConfig,
}

impl CoordinationConfig {
    /// `from_path` loads and validates a config file.
    pub fn from_path<V: Into<std::path::PathBuf>>(target: V) -> ConfigResult<Self> {
        let config: Self = from_path(target)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// `validate` checks every count is positive; `total_items` may be 0.
    pub fn validate(&self) -> ConfigResult<()> {
        let positives = [
            ("queue.capacity", self.queue.capacity),
            ("transfer.batch_size", self.transfer.batch_size),
            ("relay.chain_length", self.relay.chain_length),
            ("mailbox.exchanges", self.mailbox.exchanges),
            ("barrier.task_count", self.barrier.task_count),
        ];

        for (key, value) in positives {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: "must be at least 1",
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn batched_transfer(&self) -> BatchedTransfer {
        BatchedTransfer::batched(
            self.transfer.total_items,
            self.transfer.batch_size,
            self.queue.capacity,
        )
    }

    #[must_use]
    pub fn plain_transfer(&self) -> BatchedTransfer {
        BatchedTransfer::plain(self.transfer.total_items, self.queue.capacity)
    }
}

#[cfg(test)]
mod test_config {
    use super::*;
    use crate::transfer::TransferMode;

    #[test]
    fn empty_source_uses_defaults() {
        let config = CoordinationConfig::from_toml_str("").expect("should parse");
        assert_eq!(config, CoordinationConfig::default());
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.relay.chain_length, 100);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = CoordinationConfig::from_toml_str(
            r#"
            [transfer]
            batch_size = 5

            [barrier]
            strategy = "blocking"
            "#,
        )
        .expect("should parse");

        assert_eq!(config.transfer.batch_size, 5);
        assert_eq!(config.transfer.total_items, 50_000);
        assert_eq!(config.barrier.wait_strategy(), WaitStrategy::Blocking);
        assert_eq!(
            config.batched_transfer().mode(),
            TransferMode::Batched { batch_size: 5 }
        );
    }

    #[test]
    fn spin_strategy_carries_backoff() {
        let config = CoordinationConfig::from_toml_str(
            r"
            [barrier]
            backoff_micros = 25
            ",
        )
        .expect("should parse");

        assert_eq!(
            config.barrier.wait_strategy(),
            WaitStrategy::Spin {
                backoff: Duration::from_micros(25)
            }
        );
    }

    #[test]
    fn rejects_zero_counts() {
        let err = CoordinationConfig::from_toml_str(
            r"
            [relay]
            chain_length = 0
            ",
        )
        .expect_err("should reject");

        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "relay.chain_length",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err =
            CoordinationConfig::from_toml_str("[queue\ncapacity = ").expect_err("should fail");
        assert!(matches!(err, ConfigError::DeserializationFailed(_)));
    }

    #[test]
    fn survives_toml_round_trip() {
        let mut config = CoordinationConfig::default();
        config.mailbox.exchanges = 42;
        config.barrier.strategy = StrategyKind::Blocking;

        let content = config.to_toml_string().expect("should serialize");
        let parsed = CoordinationConfig::from_toml_str(&content).expect("should parse");

        assert_eq!(parsed, config);
    }
}

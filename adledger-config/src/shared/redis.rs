use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Connection settings for the Redis instance holding pending counter groups.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConnectionConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Number of clients kept in the connection pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Per-command timeout in milliseconds. `0` disables the timeout.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl RedisConnectionConfig {
    pub const DEFAULT_PORT: u16 = 6379;

    pub const DEFAULT_POOL_SIZE: usize = 8;

    pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "redis.host".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.pool_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "redis.pool_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn default_pool_size() -> usize {
    RedisConnectionConfig::DEFAULT_POOL_SIZE
}

fn default_command_timeout_ms() -> u64 {
    RedisConnectionConfig::DEFAULT_COMMAND_TIMEOUT_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfigWithoutSecrets {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub pool_size: usize,
    pub command_timeout_ms: u64,
}

impl From<RedisConnectionConfig> for RedisConnectionConfigWithoutSecrets {
    fn from(value: RedisConnectionConfig) -> Self {
        RedisConnectionConfigWithoutSecrets {
            host: value.host,
            port: value.port,
            username: value.username,
            pool_size: value.pool_size,
            command_timeout_ms: value.command_timeout_ms,
        }
    }
}

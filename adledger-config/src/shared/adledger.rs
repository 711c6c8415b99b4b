use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    ApplicationConfig, FlushConfig, PgConnectionConfig, PgConnectionConfigWithoutSecrets,
    RedisConnectionConfig, RedisConnectionConfigWithoutSecrets, ValidationError,
};

/// Complete configuration for the adledger service.
///
/// Loaded once at startup. This intentionally does not implement [`Serialize`] to
/// avoid leaking secrets into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct AdLedgerConfig {
    /// HTTP server address.
    pub application: ApplicationConfig,
    /// Durable ledger database.
    pub database: PgConnectionConfig,
    /// Fast counter store.
    pub redis: RedisConnectionConfig,
    /// Flush pipeline settings.
    #[serde(default)]
    pub flush: FlushConfig,
}

impl AdLedgerConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.application.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.flush.validate()
    }
}

impl Config for AdLedgerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        AdLedgerConfig::validate(self)
    }
}

/// Same as [`AdLedgerConfig`] but without secrets, safe to log at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdLedgerConfigWithoutSecrets {
    pub application: ApplicationConfig,
    pub database: PgConnectionConfigWithoutSecrets,
    pub redis: RedisConnectionConfigWithoutSecrets,
    pub flush: FlushConfig,
}

impl From<AdLedgerConfig> for AdLedgerConfigWithoutSecrets {
    fn from(value: AdLedgerConfig) -> Self {
        AdLedgerConfigWithoutSecrets {
            application: value.application,
            database: value.database.into(),
            redis: value.redis.into(),
            flush: value.flush,
        }
    }
}

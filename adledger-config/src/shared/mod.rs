//! Shared configuration types for the adledger services.

mod adledger;
mod application;
mod base;
mod connection;
mod flush;
mod redis;

pub use adledger::{AdLedgerConfig, AdLedgerConfigWithoutSecrets};
pub use application::ApplicationConfig;
pub use base::ValidationError;
pub use connection::{
    ADLEDGER_API_OPTIONS, ADLEDGER_FLUSH_OPTIONS, ADLEDGER_MIGRATION_OPTIONS, IntoConnectOptions,
    PgConnectionConfig, PgConnectionConfigWithoutSecrets, PgConnectionOptions, TlsConfig,
};
pub use flush::FlushConfig;
pub use redis::{RedisConnectionConfig, RedisConnectionConfigWithoutSecrets};

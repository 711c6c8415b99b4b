use adledger_config::shared::RedisConnectionConfig;
use uuid::Uuid;

use crate::keys::CounterKeyspace;
use crate::store::counter::redis::RedisCounterStore;

/// Generates Redis connection configuration for tests.
///
/// Configuration is read from environment variables:
/// - `TESTS_REDIS_HOST`: Redis server hostname (defaults to `localhost`)
/// - `TESTS_REDIS_PORT`: Redis server port (defaults to `6379`)
fn local_redis_connection_config() -> RedisConnectionConfig {
    RedisConnectionConfig {
        host: std::env::var("TESTS_REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("TESTS_REDIS_PORT")
            .map(|port| port.parse().expect("TESTS_REDIS_PORT must be a valid port number"))
            .unwrap_or(RedisConnectionConfig::DEFAULT_PORT),
        username: None,
        password: None,
        pool_size: 2,
        command_timeout_ms: RedisConnectionConfig::DEFAULT_COMMAND_TIMEOUT_MS,
    }
}

/// Connects a counter store under a namespace no other test shares.
///
/// # Panics
///
/// Panics if Redis is unreachable.
pub async fn spawn_counter_store() -> RedisCounterStore {
    let keyspace = CounterKeyspace::new(format!("test{}", Uuid::new_v4().simple()));

    RedisCounterStore::connect(&local_redis_connection_config(), keyspace, 10)
        .await
        .expect("Failed to connect to Redis")
}

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use adledger_config::shared::RedisConnectionConfig;
use fred::prelude::{
    ClientLike, EventInterface, HashesInterface, KeysInterface, LuaInterface, Pool,
    ReconnectPolicy, Server, ServerConfig, TcpConfig,
};
use fred::types::config::UnresponsiveConfig;
use fred::types::{Builder, Key};
use futures::future::join_all;
use secrecy::ExposeSecret;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, warn};

use crate::error::{ErrorKind, LedgerResult};
use crate::keys::CounterKeyspace;
use crate::ledger_error;
use crate::store::counter::CounterStore;
use crate::types::{AdvertisementId, CounterDeltas, CounterField, GroupClear};

/// Subtracts a merged snapshot from a group and deletes the group once nothing is left.
///
/// KEYS[1] is the group. ARGV holds `field, merged` pairs for impressions and clicks. Each
/// field is clamped at zero, so a field that the snapshot does not carry is left untouched.
/// Returns the remaining `{impressions, clicks}`.
const CLEAR_GROUP_SCRIPT: &str = r#"
local impressions = tonumber(redis.call('HGET', KEYS[1], ARGV[1]) or '0') - tonumber(ARGV[2])
local clicks = tonumber(redis.call('HGET', KEYS[1], ARGV[3]) or '0') - tonumber(ARGV[4])
if impressions < 0 then impressions = 0 end
if clicks < 0 then clicks = 0 end
if impressions == 0 and clicks == 0 then
    redis.call('DEL', KEYS[1])
    return {0, 0}
end
redis.call('HSET', KEYS[1],
    ARGV[1], string.format('%d', impressions),
    ARGV[3], string.format('%d', clicks))
return {impressions, clicks}
"#;

/// Counter store backed by Redis hashes.
///
/// Each group is a hash with `impression_count` and `click_count` fields. Scanning uses
/// `SCAN` and does not work with Redis cluster.
#[derive(Clone)]
pub struct RedisCounterStore {
    client: Pool,
    keyspace: CounterKeyspace,
    scan_page_size: u32,
}

impl RedisCounterStore {
    /// Connects a client pool and waits until it is ready.
    pub async fn connect(
        config: &RedisConnectionConfig,
        keyspace: CounterKeyspace,
        scan_page_size: u32,
    ) -> LedgerResult<Self> {
        let command_timeout = Duration::from_millis(config.command_timeout_ms);
        let username = config.username.clone();
        let password = config
            .password
            .as_ref()
            .map(|password| password.expose_secret().to_string());
        let server = Server::new(config.host.clone(), config.port);

        let pool = Builder::default_centralized()
            .with_config(|redis_config| {
                redis_config.username = username;
                redis_config.password = password;
                redis_config.server = ServerConfig::Centralized { server };
            })
            .with_connection_config(|connection_config| {
                connection_config.internal_command_timeout = command_timeout;
                connection_config.reconnect_on_auth_error = true;
                connection_config.tcp = TcpConfig {
                    #[cfg(target_os = "linux")]
                    user_timeout: Some(command_timeout),
                    ..Default::default()
                };
                connection_config.unresponsive = UnresponsiveConfig {
                    max_timeout: Some(command_timeout * 2),
                    interval: Duration::from_secs(3),
                };
            })
            .with_performance_config(|performance_config| {
                performance_config.default_command_timeout = command_timeout;
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 2_000, 2))
            .build_pool(config.pool_size)
            .map_err(|err| {
                ledger_error!(
                    ErrorKind::ConfigError,
                    "Failed to build the Redis client pool",
                    source: err
                )
            })?;

        for client in pool.clients() {
            let mut error_rx = client.error_rx();
            let mut reconnect_rx = client.reconnect_rx();

            tokio::spawn(async move {
                loop {
                    match error_rx.recv().await {
                        Ok((error, server)) => {
                            error!(?server, %error, "redis client error");
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            tokio::spawn(async move {
                loop {
                    match reconnect_rx.recv().await {
                        Ok(server) => debug!(?server, "redis client connected"),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        let connection_tasks = pool.connect_pool();
        pool.wait_for_connect().await?;
        debug!(pool_size = config.pool_size, "redis pool connected");

        tokio::spawn(async move {
            let _results = join_all(connection_tasks).await;
        });

        Ok(Self {
            client: pool,
            keyspace,
            scan_page_size,
        })
    }

    pub fn keyspace(&self) -> &CounterKeyspace {
        &self.keyspace
    }

    /// Closes every connection of the pool.
    pub async fn quit(&self) -> LedgerResult<()> {
        self.client.quit().await?;

        Ok(())
    }
}

impl CounterStore for RedisCounterStore {
    async fn increment(
        &self,
        advertisement_id: AdvertisementId,
        field: CounterField,
        by: i64,
    ) -> LedgerResult<i64> {
        let key = self.keyspace.group_key(advertisement_id);
        let value: i64 = self.client.hincrby(key, field.field_name(), by).await?;

        Ok(value)
    }

    async fn list_pending_group_keys(&self, pattern: &str) -> LedgerResult<Vec<String>> {
        // SCAN may return a key more than once.
        let mut keys = BTreeSet::new();
        let mut cursor = "0".to_string();

        loop {
            let (next_cursor, page): (String, Vec<Key>) = self
                .client
                .scan_page(cursor, pattern.to_string(), Some(self.scan_page_size), None)
                .await?;

            for key in page {
                match key.into_string() {
                    Some(key) => {
                        keys.insert(key);
                    }
                    None => warn!(%pattern, "skipping counter key that is not valid UTF-8"),
                }
            }

            cursor = next_cursor;
            if cursor == "0" {
                break;
            }
        }

        Ok(keys.into_iter().collect())
    }

    async fn read_group(&self, key: &str) -> LedgerResult<CounterDeltas> {
        let fields: HashMap<String, i64> = self.client.hgetall(key).await?;

        Ok(CounterDeltas::from_fields(&fields))
    }

    async fn delete_group(&self, key: &str) -> LedgerResult<()> {
        let _deleted: i64 = self.client.del(key).await?;

        Ok(())
    }

    async fn clear_group(&self, key: &str, merged: CounterDeltas) -> LedgerResult<GroupClear> {
        let args = vec![
            CounterField::Impression.field_name().to_string(),
            merged.impressions.to_string(),
            CounterField::Click.field_name().to_string(),
            merged.clicks.to_string(),
        ];

        let remaining: Vec<i64> = self.client.eval(CLEAR_GROUP_SCRIPT, key, args).await?;

        match remaining.as_slice() {
            [0, 0] => Ok(GroupClear::Removed),
            [impressions, clicks] => Ok(GroupClear::Retained(CounterDeltas::new(
                *impressions,
                *clicks,
            ))),
            other => Err(ledger_error!(
                ErrorKind::InvalidData,
                "Unexpected reply from the clear group script",
                format!("{other:?}")
            )),
        }
    }
}

use adledger_config::shared::{
    ADLEDGER_FLUSH_OPTIONS, IntoConnectOptions, PgConnectionConfig, TlsConfig,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection};
use uuid::Uuid;

use crate::migrations::apply_ledger_migrations;
use crate::store::both::postgres::PostgresLedgerStore;
use crate::types::{AdvertisementId, AdvertiserId};

/// Generates Postgres connection configuration for an isolated test database.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        // Each test gets its own database.
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig::disabled(),
        max_connections: 4,
    }
}

/// A freshly created and migrated ledger database.
pub struct TestLedgerDatabase {
    pub config: PgConnectionConfig,
    pub store: PostgresLedgerStore,
}

impl TestLedgerDatabase {
    /// Inserts a funded advertiser and returns its id.
    pub async fn insert_advertiser(&self, name: &str, budget: f64) -> AdvertiserId {
        let (id,): (i64,) =
            sqlx::query_as("insert into advertisers (name, budget) values ($1, $2) returning id")
                .bind(name)
                .bind(budget)
                .fetch_one(self.store.pool())
                .await
                .expect("Failed to insert advertiser");

        AdvertiserId::new(id)
    }

    /// Inserts an advertisement with zero totals and returns its id.
    pub async fn insert_advertisement(&self, advertiser_id: AdvertiserId) -> AdvertisementId {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            insert into advertisements (advertiser_id, title, content, cpm_rate, cpc_rate)
            values ($1, 'test advertisement', 'test content', 1.5, 0.25)
            returning id
            "#,
        )
        .bind(advertiser_id)
        .fetch_one(self.store.pool())
        .await
        .expect("Failed to insert advertisement");

        AdvertisementId::new(id)
    }

    /// Closes the pool and drops the database.
    ///
    /// Cleanup failures are logged and ignored, so a test never fails while tearing down.
    pub async fn drop_database(self) {
        self.store.close().await;

        let mut connection = match PgConnection::connect_with(&self.config.without_db(None)).await
        {
            Ok(connection) => connection,
            Err(err) => {
                eprintln!("warning: failed to connect to Postgres for cleanup: {err}");
                return;
            }
        };

        if let Err(err) = connection
            .execute(&*format!(
                r#"drop database if exists "{}" with (force);"#,
                self.config.name
            ))
            .await
        {
            eprintln!("warning: failed to drop database {}: {err}", self.config.name);
        }
    }
}

/// Creates a uniquely named database, applies the ledger migrations and opens a store on it.
///
/// # Panics
///
/// Panics if the database cannot be created or migrated.
pub async fn spawn_ledger_database() -> TestLedgerDatabase {
    let config = local_pg_connection_config();

    let mut connection = PgConnection::connect_with(&config.without_db(None))
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create test database");
    connection
        .close()
        .await
        .expect("Failed to close the admin connection");

    apply_ledger_migrations(&config)
        .await
        .expect("Failed to run ledger migrations");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.with_db(Some(&ADLEDGER_FLUSH_OPTIONS)))
        .await
        .expect("Failed to connect to the test database");

    TestLedgerDatabase {
        config,
        store: PostgresLedgerStore::from_pool(pool),
    }
}

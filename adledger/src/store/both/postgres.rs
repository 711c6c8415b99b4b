use std::time::Duration;

use adledger_config::shared::{IntoConnectOptions, PgConnectionConfig, PgConnectionOptions};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use crate::error::LedgerResult;
use crate::store::aggregate::AggregateStore;
use crate::store::catalog::AdCatalog;
use crate::types::{
    Advertisement, AdvertisementAggregate, AdvertisementId, Advertiser, AdvertiserId,
    CounterDeltas, MergeOutcome,
};

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum time to wait for a pooled connection before failing the operation.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const ADVERTISEMENT_COLUMNS: &str = "a.id, a.advertiser_id, a.title, a.content, \
     a.impression_count, a.click_count, a.cpm_rate, a.cpc_rate, a.created_at, a.updated_at";

/// Creates a lazily connected pool.
///
/// Returns immediately; connections are opened on first use, so an unreachable database
/// surfaces as failed operations rather than a failed startup.
fn create_database_pool(config: &PgConnectionConfig, options: &PgConnectionOptions) -> PgPool {
    let connect_options = config.with_db(Some(options));

    PgPoolOptions::new()
        .min_connections(0)
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(connect_options)
}

/// Postgres-backed ledger holding advertisers, advertisements and their running totals.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(config: &PgConnectionConfig, options: &PgConnectionOptions) -> Self {
        Self {
            pool: create_database_pool(config, options),
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes the pool, waiting for checked out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl AggregateStore for PostgresLedgerStore {
    async fn merge_counts(
        &self,
        advertisement_id: AdvertisementId,
        deltas: CounterDeltas,
    ) -> LedgerResult<MergeOutcome> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            update advertisements
            set impression_count = impression_count + $1,
                click_count = click_count + $2,
                updated_at = now()
            where id = $3
            "#,
        )
        .bind(deltas.impressions)
        .bind(deltas.clicks)
        .bind(advertisement_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(MergeOutcome::AggregateMissing);
        }

        tx.commit().await?;

        debug!(
            %advertisement_id,
            impressions = deltas.impressions,
            clicks = deltas.clicks,
            "merged counter deltas"
        );

        Ok(MergeOutcome::Applied)
    }

    async fn get_aggregate(
        &self,
        advertisement_id: AdvertisementId,
    ) -> LedgerResult<Option<AdvertisementAggregate>> {
        let aggregate = sqlx::query_as::<_, AdvertisementAggregate>(
            r#"
            select id as advertisement_id, impression_count, click_count
            from advertisements
            where id = $1
            "#,
        )
        .bind(advertisement_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(aggregate)
    }
}

impl AdCatalog for PostgresLedgerStore {
    async fn get_advertiser(
        &self,
        advertiser_id: AdvertiserId,
    ) -> LedgerResult<Option<Advertiser>> {
        let advertiser = sqlx::query_as::<_, Advertiser>(
            r#"
            select id, name, budget, created_at, updated_at
            from advertisers
            where id = $1
            "#,
        )
        .bind(advertiser_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(advertiser)
    }

    async fn get_advertisement(
        &self,
        advertisement_id: AdvertisementId,
    ) -> LedgerResult<Option<Advertisement>> {
        let query = format!("select {ADVERTISEMENT_COLUMNS} from advertisements a where a.id = $1");
        let advertisement = sqlx::query_as::<_, Advertisement>(&query)
            .bind(advertisement_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(advertisement)
    }

    async fn list_eligible_advertisements(&self) -> LedgerResult<Vec<Advertisement>> {
        let query = format!(
            "select {ADVERTISEMENT_COLUMNS} from advertisements a \
             join advertisers v on v.id = a.advertiser_id \
             where v.budget > 0 \
             order by a.id"
        );
        let advertisements = sqlx::query_as::<_, Advertisement>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(advertisements)
    }
}

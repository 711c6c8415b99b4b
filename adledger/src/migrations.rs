use adledger_config::shared::{ADLEDGER_MIGRATION_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Applies the ledger schema migrations.
///
/// Uses a dedicated single connection pool with long statement timeouts, closed once the
/// migrations ran.
pub async fn apply_ledger_migrations(
    connection_config: &PgConnectionConfig,
) -> Result<(), sqlx::Error> {
    let options = connection_config.with_db(Some(&ADLEDGER_MIGRATION_OPTIONS));

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    info!("applying ledger migrations");

    let migrator = sqlx::migrate!("./migrations");
    migrator.run(&pool).await?;
    pool.close().await;

    info!("ledger migrations successfully applied");

    Ok(())
}

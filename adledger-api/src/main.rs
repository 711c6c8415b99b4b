use std::env;

use adledger_api::startup::Application;
use adledger_config::load_config;
use adledger_config::shared::{AdLedgerConfig, PgConnectionConfig};
use adledger_telemetry::tracing::init_tracing;
use anyhow::{Context, anyhow};
use tracing::{error, info};

/// Entry point for the adledger service.
///
/// Serves the HTTP API and runs the flush scheduler, or only applies migrations when
/// started with `migrate`.
fn main() -> anyhow::Result<()> {
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // Flush workers and request handlers share one multi-threaded runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())?;

    Ok(())
}

async fn async_main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.as_slice() {
        [] => {
            let config = load_config::<AdLedgerConfig>()
                .context("loading adledger configuration for server startup")?;
            log_pg_connection_config(&config.database);
            Application::migrate_database(&config.database).await?;

            let application = Application::build(config).await?;
            application.run_until_stopped().await?;
        }
        [command] => match command.as_str() {
            "migrate" => {
                let config = load_config::<AdLedgerConfig>()
                    .context("loading adledger configuration for migrations")?;
                log_pg_connection_config(&config.database);
                Application::migrate_database(&config.database).await?;
                info!("database migrated successfully");
            }
            _ => {
                error!(%command, "invalid command");
                return Err(anyhow!("invalid command: {command}"));
            }
        },
        _ => {
            error!("invalid number of command line arguments");
            return Err(anyhow!("invalid number of command line arguments"));
        }
    }

    Ok(())
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    info!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "pg database options",
    );
}

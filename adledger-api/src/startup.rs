use std::net::TcpListener;

use actix_web::{App, HttpServer, dev::Server, web};
use adledger::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use adledger::flush::cycle::FlushPipeline;
use adledger::flush::scheduler::{FlushScheduler, FlushSchedulerHandle};
use adledger::keys::CounterKeyspace;
use adledger::migrations::apply_ledger_migrations;
use adledger::store::both::postgres::PostgresLedgerStore;
use adledger::store::catalog::AdCatalog;
use adledger::store::counter::CounterStore;
use adledger::store::counter::redis::RedisCounterStore;
use adledger_config::shared::{
    ADLEDGER_API_OPTIONS, ADLEDGER_FLUSH_OPTIONS, AdLedgerConfig, PgConnectionConfig,
};
use adledger_telemetry::metrics::init_metrics_handle;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use crate::routes::{configure_api, health_check::health_check, metrics::metrics};

/// The HTTP server together with the flush scheduler feeding the ledger.
///
/// Both share one process: request handlers increment counters, the scheduler drains them.
pub struct Application {
    port: u16,
    server: Server,
    scheduler: FlushSchedulerHandle,
    shutdown_tx: ShutdownTx,
    counter_store: RedisCounterStore,
    catalog_store: PostgresLedgerStore,
    flush_store: PostgresLedgerStore,
}

impl Application {
    /// Connects the stores, starts the flush scheduler and binds the HTTP server.
    ///
    /// Fails if Redis cannot be reached or the address cannot be bound, so a misconfigured
    /// process never starts serving.
    pub async fn build(config: AdLedgerConfig) -> anyhow::Result<Self> {
        let catalog_store = PostgresLedgerStore::new(&config.database, &ADLEDGER_API_OPTIONS);
        let flush_store = PostgresLedgerStore::new(&config.database, &ADLEDGER_FLUSH_OPTIONS);

        let keyspace = CounterKeyspace::new(config.flush.key_namespace.clone());
        let counter_store =
            RedisCounterStore::connect(&config.redis, keyspace, config.flush.scan_page_size)
                .await?;

        let listener = TcpListener::bind(config.application.address())?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let pipeline =
            FlushPipeline::from_config(counter_store.clone(), flush_store.clone(), &config.flush);
        let scheduler = FlushScheduler::new(pipeline, config.flush.interval(), shutdown_rx).start();

        let server = run(listener, counter_store.clone(), catalog_store.clone())?;

        info!(port, "adledger api started");

        Ok(Self {
            port,
            server,
            scheduler,
            shutdown_tx,
            counter_store,
            catalog_store,
            flush_store,
        })
    }

    /// Applies the ledger schema migrations.
    pub async fn migrate_database(config: &PgConnectionConfig) -> anyhow::Result<()> {
        apply_ledger_migrations(config).await?;

        Ok(())
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until the server stops, then shuts the flush scheduler down.
    ///
    /// The server stops on SIGINT or SIGTERM. A flush cycle running at that point is
    /// awaited before the connections are closed.
    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let server_result = self.server.await;

        info!("http server stopped, shutting down the flush scheduler");
        self.shutdown_tx.shutdown();
        self.scheduler.wait().await?;

        self.catalog_store.close().await;
        self.flush_store.close().await;
        if let Err(err) = self.counter_store.quit().await {
            warn!(error = %err, "failed to close the redis connections");
        }

        server_result?;

        Ok(())
    }
}

/// Creates the HTTP server over the given stores.
///
/// Generic over the stores so tests can serve from memory.
pub fn run<C, S>(listener: TcpListener, counter_store: C, catalog: S) -> anyhow::Result<Server>
where
    C: CounterStore + Send + Sync + 'static,
    S: AdCatalog + Send + Sync + 'static,
{
    let prometheus_handle = web::ThinData(init_metrics_handle()?);
    let counter_store = web::Data::new(counter_store);
    let catalog = web::Data::new(catalog);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(prometheus_handle.clone())
            .app_data(counter_store.clone())
            .app_data(catalog.clone())
            .service(health_check)
            .service(metrics)
            .configure(configure_api::<C, S>)
    })
    .listen(listener)?
    .run();

    Ok(server)
}

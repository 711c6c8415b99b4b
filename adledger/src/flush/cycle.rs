use std::time::Instant;

use adledger_config::shared::FlushConfig;
use metrics::{counter, histogram};
use tracing::{Instrument, error, info, info_span};

use crate::error::LedgerResult;
use crate::flush::dispatcher::FlushDispatcher;
use crate::flush::report::CycleReport;
use crate::flush::scanner::KeyScanner;
use crate::flush::worker::FlushWorker;
use crate::keys::CounterKeyspace;
use crate::metrics::{
    ADLEDGER_FLUSH_CYCLE_DURATION_SECONDS, ADLEDGER_FLUSH_CYCLES_TOTAL, STATUS_LABEL,
};
use crate::store::aggregate::AggregateStore;
use crate::store::counter::CounterStore;
use crate::types::CycleId;

/// One scan followed by one dispatch of every scanned key.
///
/// Groups created after the scan wait for the next cycle.
#[derive(Debug, Clone)]
pub struct FlushPipeline<C, A> {
    scanner: KeyScanner<C>,
    dispatcher: FlushDispatcher<C, A>,
}

impl<C, A> FlushPipeline<C, A>
where
    C: CounterStore + Clone + Send + Sync + 'static,
    A: AggregateStore + Clone + Send + Sync + 'static,
{
    pub fn new(scanner: KeyScanner<C>, dispatcher: FlushDispatcher<C, A>) -> Self {
        Self {
            scanner,
            dispatcher,
        }
    }

    /// Builds a pipeline whose scanner and workers share the given stores.
    pub fn from_config(counter_store: C, aggregate_store: A, config: &FlushConfig) -> Self {
        let keyspace = CounterKeyspace::new(config.key_namespace.clone());
        let scanner = KeyScanner::new(counter_store.clone(), keyspace.clone());
        let worker = FlushWorker::new(counter_store, aggregate_store, keyspace);
        let dispatcher = FlushDispatcher::new(
            worker,
            config.max_concurrent_workers as usize,
            config.worker_timeout(),
        );

        Self::new(scanner, dispatcher)
    }

    /// Runs a single flush cycle.
    ///
    /// Fails only when the scan fails, in which case nothing was touched. Failures of
    /// single groups are part of the returned report.
    pub async fn run_cycle(&self) -> LedgerResult<CycleReport> {
        let cycle_id = CycleId::new();
        let span = info_span!("flush_cycle", %cycle_id);

        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: CycleId) -> LedgerResult<CycleReport> {
        let started = Instant::now();

        let keys = match self.scanner.scan().await {
            Ok(keys) => keys,
            Err(err) => {
                error!(error = %err, "flush cycle aborted, could not scan counter groups");
                counter!(ADLEDGER_FLUSH_CYCLES_TOTAL, STATUS_LABEL => "aborted").increment(1);

                return Err(err);
            }
        };

        let groups = self.dispatcher.dispatch(keys).await;
        let report = CycleReport {
            cycle_id,
            duration: started.elapsed(),
            groups,
        };

        counter!(ADLEDGER_FLUSH_CYCLES_TOTAL, STATUS_LABEL => report.status()).increment(1);
        histogram!(ADLEDGER_FLUSH_CYCLE_DURATION_SECONDS).record(report.duration.as_secs_f64());

        if report.scanned() > 0 {
            info!(
                scanned = report.scanned(),
                merged = report.merged(),
                empty = report.empty(),
                orphaned = report.orphaned(),
                failed = report.failed(),
                duration_ms = report.duration.as_millis() as u64,
                "flush cycle finished"
            );
        }

        Ok(report)
    }
}

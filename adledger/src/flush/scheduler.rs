use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, LedgerResult};
use crate::flush::cycle::FlushPipeline;
use crate::flush::report::CycleReport;
use crate::ledger_error;
use crate::metrics::ADLEDGER_FLUSH_SKIPPED_TICKS_TOTAL;
use crate::store::aggregate::AggregateStore;
use crate::store::counter::CounterStore;

type CycleHandle = JoinHandle<LedgerResult<CycleReport>>;

/// Runs flush cycles on a fixed interval, never two at a time.
///
/// A tick that arrives while the previous cycle is still running is skipped. The first
/// cycle starts one interval after [`FlushScheduler::start`].
#[derive(Debug)]
pub struct FlushScheduler<C, A> {
    pipeline: Arc<FlushPipeline<C, A>>,
    interval: Duration,
    shutdown_rx: ShutdownRx,
}

impl<C, A> FlushScheduler<C, A>
where
    C: CounterStore + Clone + Send + Sync + 'static,
    A: AggregateStore + Clone + Send + Sync + 'static,
{
    pub fn new(pipeline: FlushPipeline<C, A>, interval: Duration, shutdown_rx: ShutdownRx) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            interval,
            shutdown_rx,
        }
    }

    /// Spawns the scheduler loop.
    pub fn start(self) -> FlushSchedulerHandle {
        info!(interval_ms = self.interval.as_millis() as u64, "starting flush scheduler");

        FlushSchedulerHandle {
            join_handle: tokio::spawn(self.run()),
        }
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: Option<CycleHandle> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.wait_for_shutdown() => {
                    info!("flush scheduler received shutdown");
                    break;
                }

                _ = ticker.tick() => {
                    if in_flight.as_ref().is_some_and(|handle| !handle.is_finished()) {
                        warn!("previous flush cycle still running, skipping tick");
                        counter!(ADLEDGER_FLUSH_SKIPPED_TICKS_TOTAL).increment(1);
                        continue;
                    }

                    if let Some(handle) = in_flight.take() {
                        log_cycle_result(handle.await);
                    }

                    let pipeline = self.pipeline.clone();
                    in_flight = Some(tokio::spawn(async move { pipeline.run_cycle().await }));
                }
            }
        }

        // A cycle is never cancelled halfway; shutdown waits for it.
        if let Some(handle) = in_flight.take() {
            info!("waiting for the running flush cycle to finish");
            log_cycle_result(handle.await);
        }

        info!("flush scheduler stopped");
    }
}

fn log_cycle_result(result: Result<LedgerResult<CycleReport>, JoinError>) {
    match result {
        Ok(Ok(report)) => {
            if let Some(err) = report.error() {
                warn!(
                    cycle_id = %report.cycle_id,
                    failed = report.failed(),
                    error = %err,
                    "flush cycle finished with failed groups"
                );
            } else {
                debug!(cycle_id = %report.cycle_id, "flush cycle completed");
            }
        }
        // Already logged by the cycle itself.
        Ok(Err(_)) => {}
        Err(join_err) => {
            error!(error = %join_err, "flush cycle task panicked");
        }
    }
}

/// Handle to a running [`FlushScheduler`].
#[derive(Debug)]
pub struct FlushSchedulerHandle {
    join_handle: JoinHandle<()>,
}

impl FlushSchedulerHandle {
    /// Waits until the scheduler stopped after shutdown was signaled.
    pub async fn wait(self) -> LedgerResult<()> {
        self.join_handle.await.map_err(|err| {
            ledger_error!(
                ErrorKind::SchedulerPanic,
                "The flush scheduler panicked",
                err.to_string()
            )
        })
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

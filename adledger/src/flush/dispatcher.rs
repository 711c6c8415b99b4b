use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::gauge;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{Instrument, debug, error, info_span};

use crate::error::{ErrorKind, LedgerError, LedgerResult};
use crate::flush::report::GroupReport;
use crate::flush::worker::{FlushWorker, GroupFlushOutcome};
use crate::ledger_error;
use crate::metrics::ADLEDGER_FLUSH_ACTIVE_WORKERS;
use crate::store::aggregate::AggregateStore;
use crate::store::counter::CounterStore;

/// Keeps the active workers gauge in sync, even when a worker panics.
struct ActiveWorkerGuard;

impl ActiveWorkerGuard {
    fn enter() -> Self {
        gauge!(ADLEDGER_FLUSH_ACTIVE_WORKERS).increment(1.0);
        Self
    }
}

impl Drop for ActiveWorkerGuard {
    fn drop(&mut self) {
        gauge!(ADLEDGER_FLUSH_ACTIVE_WORKERS).decrement(1.0);
    }
}

/// Runs one flush worker per key with at most `max_concurrent_workers` in flight.
///
/// Workers are independent: a failed, timed out or panicked worker is reported for its
/// key and never cancels the others.
#[derive(Debug, Clone)]
pub struct FlushDispatcher<C, A> {
    worker: FlushWorker<C, A>,
    max_concurrent_workers: usize,
    worker_timeout: Option<Duration>,
}

impl<C, A> FlushDispatcher<C, A>
where
    C: CounterStore + Clone + Send + Sync + 'static,
    A: AggregateStore + Clone + Send + Sync + 'static,
{
    pub fn new(
        worker: FlushWorker<C, A>,
        max_concurrent_workers: usize,
        worker_timeout: Option<Duration>,
    ) -> Self {
        Self {
            worker,
            // A zero cap would never hand out a permit.
            max_concurrent_workers: max_concurrent_workers.max(1),
            worker_timeout,
        }
    }

    pub fn max_concurrent_workers(&self) -> usize {
        self.max_concurrent_workers
    }

    /// Flushes every key and returns one report per key once all workers finished.
    ///
    /// Keys are started in order. When the cap is reached, starting the next key waits for
    /// a running worker to release its slot.
    pub async fn dispatch(&self, keys: Vec<String>) -> Vec<GroupReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_workers));
        let mut join_set = JoinSet::new();
        let mut task_keys = HashMap::with_capacity(keys.len());
        let mut reports = Vec::with_capacity(keys.len());

        for key in keys {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    // The semaphore is owned by this call and never closed.
                    reports.push(GroupReport::new(
                        key,
                        Err(ledger_error!(
                            ErrorKind::InvalidState,
                            "Could not acquire a flush worker slot",
                            err.to_string()
                        )),
                    ));
                    continue;
                }
            };

            let worker = self.worker.clone();
            let worker_timeout = self.worker_timeout;
            let task_key = key.clone();
            let span = info_span!("flush_worker", key = %key);

            let abort_handle = join_set.spawn(
                async move {
                    let _active = ActiveWorkerGuard::enter();
                    // Panics are caught inside the task so the report keeps the key.
                    let result = AssertUnwindSafe(run_worker(&worker, &task_key, worker_timeout))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(panic_error(&task_key, panic)));
                    drop(permit);

                    GroupReport::new(task_key, result)
                }
                .instrument(span),
            );
            task_keys.insert(abort_handle.id(), key);

            // Collect workers that already finished so the set stays small.
            while let Some(joined) = join_set.try_join_next_with_id() {
                reports.push(Self::into_report(joined, &mut task_keys));
            }
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            reports.push(Self::into_report(joined, &mut task_keys));
        }

        reports
    }

    /// Turns a joined task into its report, recovering the key of a task that did not
    /// complete from `task_keys`.
    fn into_report(
        joined: Result<(Id, GroupReport), JoinError>,
        task_keys: &mut HashMap<Id, String>,
    ) -> GroupReport {
        match joined {
            Ok((id, report)) => {
                task_keys.remove(&id);
                report
            }
            // Only reachable if the task is cancelled, e.g. while the runtime shuts down.
            Err(join_err) => {
                let key = task_keys.remove(&join_err.id()).unwrap_or_default();
                error!(%key, error = %join_err, "flush worker task did not complete");

                GroupReport::new(
                    key,
                    Err(ledger_error!(
                        ErrorKind::FlushWorkerPanic,
                        "A flush worker task did not complete",
                        join_err.to_string()
                    )),
                )
            }
        }
    }
}

fn panic_error(key: &str, panic: Box<dyn Any + Send>) -> LedgerError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    error!(%key, %message, "flush worker panicked");

    ledger_error!(
        ErrorKind::FlushWorkerPanic,
        "A flush worker panicked",
        format!("Worker for key '{key}' panicked: {message}")
    )
}

async fn run_worker<C, A>(
    worker: &FlushWorker<C, A>,
    key: &str,
    worker_timeout: Option<Duration>,
) -> LedgerResult<GroupFlushOutcome>
where
    C: CounterStore,
    A: AggregateStore,
{
    let Some(worker_timeout) = worker_timeout else {
        return worker.flush(key).await;
    };

    match tokio::time::timeout(worker_timeout, worker.flush(key)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(%key, ?worker_timeout, "flush worker timed out");

            Err(ledger_error!(
                ErrorKind::FlushWorkerTimeout,
                "A flush worker did not finish in time",
                format!("Worker for key '{key}' exceeded {worker_timeout:?}")
            ))
        }
    }
}

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::{ErrorKind, LedgerError, LedgerResult};
use crate::ledger_error;
use crate::store::aggregate::AggregateStore;
use crate::store::counter::CounterStore;
use crate::types::{
    AdvertisementAggregate, AdvertisementId, CounterDeltas, CounterField, GroupClear,
    MergeOutcome,
};

#[derive(Debug)]
struct CounterFaults {
    fail_increments: AtomicBool,
    fail_scans: AtomicBool,
    fail_reads: AtomicBool,
    fail_clears: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
    scans_gated: AtomicBool,
    scan_gate: Semaphore,
    clears_gated: AtomicBool,
    clear_gate: Semaphore,
    scan_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    in_flight_reads: AtomicUsize,
    peak_in_flight_reads: AtomicUsize,
}

impl CounterFaults {
    fn new() -> Self {
        Self {
            fail_increments: AtomicBool::new(false),
            fail_scans: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_clears: AtomicBool::new(false),
            read_delay: Mutex::new(None),
            scans_gated: AtomicBool::new(false),
            scan_gate: Semaphore::new(0),
            clears_gated: AtomicBool::new(false),
            clear_gate: Semaphore::new(0),
            scan_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            in_flight_reads: AtomicUsize::new(0),
            peak_in_flight_reads: AtomicUsize::new(0),
        }
    }
}

/// Wraps a [`CounterStore`] with switchable failures and call tracking.
///
/// Every clone shares the same switches, so a test can keep one handle while the pipeline
/// owns another.
#[derive(Debug, Clone)]
pub struct FaultyCounterStore<S> {
    inner: S,
    faults: Arc<CounterFaults>,
}

impl<S> FaultyCounterStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(CounterFaults::new()),
        }
    }

    pub fn get_inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_increments(&self, fail: bool) {
        self.faults.fail_increments.store(fail, Ordering::SeqCst);
    }

    pub fn fail_scans(&self, fail: bool) {
        self.faults.fail_scans.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clears(&self, fail: bool) {
        self.faults.fail_clears.store(fail, Ordering::SeqCst);
    }

    /// Delays every read, keeping workers busy long enough to observe them overlap.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self
            .faults
            .read_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Makes every following scan wait until [`FaultyCounterStore::release_scans`] lets it
    /// through.
    pub fn gate_scans(&self) {
        self.faults.scans_gated.store(true, Ordering::SeqCst);
    }

    /// Lets `scans` blocked or future scans proceed.
    pub fn release_scans(&self, scans: usize) {
        self.faults.scan_gate.add_permits(scans);
    }

    /// Makes every following clear wait until [`FaultyCounterStore::release_clears`]
    /// lets it through. The group snapshot is already taken at that point.
    pub fn gate_clears(&self) {
        self.faults.clears_gated.store(true, Ordering::SeqCst);
    }

    pub fn release_clears(&self, clears: usize) {
        self.faults.clear_gate.add_permits(clears);
    }

    pub fn scan_calls(&self) -> usize {
        self.faults.scan_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.faults.clear_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight_reads(&self) -> usize {
        self.faults.peak_in_flight_reads.load(Ordering::SeqCst)
    }

    fn read_delay(&self) -> Option<Duration> {
        *self
            .faults
            .read_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the in-flight read count when a read ends, even if it is cancelled.
struct InFlightRead<'a>(&'a CounterFaults);

impl<'a> InFlightRead<'a> {
    fn enter(faults: &'a CounterFaults) -> Self {
        let current = faults.in_flight_reads.fetch_add(1, Ordering::SeqCst) + 1;
        faults
            .peak_in_flight_reads
            .fetch_max(current, Ordering::SeqCst);
        Self(faults)
    }
}

impl Drop for InFlightRead<'_> {
    fn drop(&mut self) {
        self.0.in_flight_reads.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn pass_gate(gated: &AtomicBool, gate: &Semaphore) {
    if gated.load(Ordering::SeqCst) {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

fn injected(kind: ErrorKind, operation: &'static str) -> LedgerError {
    ledger_error!(kind, "Injected counter store failure", operation)
}

impl<S> CounterStore for FaultyCounterStore<S>
where
    S: CounterStore + Send + Sync,
{
    async fn increment(
        &self,
        advertisement_id: AdvertisementId,
        field: CounterField,
        by: i64,
    ) -> LedgerResult<i64> {
        if self.faults.fail_increments.load(Ordering::SeqCst) {
            return Err(injected(ErrorKind::CounterStoreConnectionFailed, "increment"));
        }

        self.inner.increment(advertisement_id, field, by).await
    }

    async fn list_pending_group_keys(&self, pattern: &str) -> LedgerResult<Vec<String>> {
        self.faults.scan_calls.fetch_add(1, Ordering::SeqCst);

        pass_gate(&self.faults.scans_gated, &self.faults.scan_gate).await;

        if self.faults.fail_scans.load(Ordering::SeqCst) {
            return Err(injected(ErrorKind::CounterStoreConnectionFailed, "scan"));
        }

        self.inner.list_pending_group_keys(pattern).await
    }

    async fn read_group(&self, key: &str) -> LedgerResult<CounterDeltas> {
        let _in_flight = InFlightRead::enter(&self.faults);

        if let Some(delay) = self.read_delay() {
            tokio::time::sleep(delay).await;
        }

        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(injected(ErrorKind::CounterStoreConnectionFailed, "read"));
        }

        self.inner.read_group(key).await
    }

    async fn delete_group(&self, key: &str) -> LedgerResult<()> {
        self.inner.delete_group(key).await
    }

    async fn clear_group(&self, key: &str, merged: CounterDeltas) -> LedgerResult<GroupClear> {
        self.faults.clear_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.faults.clears_gated, &self.faults.clear_gate).await;

        if self.faults.fail_clears.load(Ordering::SeqCst) {
            return Err(injected(ErrorKind::CounterStoreCommandFailed, "clear"));
        }

        self.inner.clear_group(key, merged).await
    }
}

/// Wraps an [`AggregateStore`] that can be switched to unreachable.
#[derive(Debug, Clone)]
pub struct FaultyAggregateStore<A> {
    inner: A,
    unreachable: Arc<AtomicBool>,
    merge_calls: Arc<AtomicUsize>,
}

impl<A> FaultyAggregateStore<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            unreachable: Arc::new(AtomicBool::new(false)),
            merge_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn get_inner(&self) -> &A {
        &self.inner
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn merge_calls(&self) -> usize {
        self.merge_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> LedgerResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ledger_error!(
                ErrorKind::AggregateStoreConnectionFailed,
                "Injected aggregate store failure"
            ));
        }

        Ok(())
    }
}

impl<A> AggregateStore for FaultyAggregateStore<A>
where
    A: AggregateStore + Send + Sync,
{
    async fn merge_counts(
        &self,
        advertisement_id: AdvertisementId,
        deltas: CounterDeltas,
    ) -> LedgerResult<MergeOutcome> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        self.inner.merge_counts(advertisement_id, deltas).await
    }

    async fn get_aggregate(
        &self,
        advertisement_id: AdvertisementId,
    ) -> LedgerResult<Option<AdvertisementAggregate>> {
        self.check_reachable()?;

        self.inner.get_aggregate(advertisement_id).await
    }
}

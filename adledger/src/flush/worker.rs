use metrics::counter;
use tracing::{debug, error, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::failpoints::{
    FLUSH_WORKER__AFTER_MERGE_COMMIT, FLUSH_WORKER__BEFORE_MERGE, ledger_fail_point,
};
use crate::keys::CounterKeyspace;
use crate::metrics::{ADLEDGER_FLUSH_GROUPS_TOTAL, OUTCOME_LABEL};
use crate::store::aggregate::AggregateStore;
use crate::store::counter::CounterStore;
use crate::types::{AdvertisementId, CounterDeltas, GroupClear, MergeOutcome};

/// What happened to one group that was flushed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupFlushOutcome {
    /// The deltas were committed and the snapshot retired from the counter store.
    Merged {
        advertisement_id: AdvertisementId,
        deltas: CounterDeltas,
        clear: GroupClear,
    },
    /// The group held nothing to merge.
    Empty { advertisement_id: AdvertisementId },
    /// The advertisement has no ledger row. The counts were discarded.
    Orphaned {
        advertisement_id: AdvertisementId,
        deltas: CounterDeltas,
    },
}

impl GroupFlushOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupFlushOutcome::Merged { .. } => "merged",
            GroupFlushOutcome::Empty { .. } => "empty",
            GroupFlushOutcome::Orphaned { .. } => "orphaned",
        }
    }
}

/// Stage of a flush at which a group failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushStage {
    Parse,
    Read,
    Merge,
    Clear,
}

impl FlushStage {
    fn failure_outcome(&self) -> &'static str {
        match self {
            FlushStage::Parse => "invalid_key",
            FlushStage::Read => "read_failed",
            FlushStage::Merge => "merge_failed",
            FlushStage::Clear => "clear_failed",
        }
    }
}

/// Folds one counter group into the ledger.
///
/// The group is read, its deltas are merged in a single ledger transaction, and only
/// after the commit is the merged snapshot subtracted from the counter store. Any failure
/// before the commit leaves the group untouched for the next cycle. A failure after the
/// commit also leaves it, and the next cycle merges the same deltas again.
#[derive(Debug, Clone)]
pub struct FlushWorker<C, A> {
    counter_store: C,
    aggregate_store: A,
    keyspace: CounterKeyspace,
}

impl<C, A> FlushWorker<C, A>
where
    C: CounterStore,
    A: AggregateStore,
{
    pub fn new(counter_store: C, aggregate_store: A, keyspace: CounterKeyspace) -> Self {
        Self {
            counter_store,
            aggregate_store,
            keyspace,
        }
    }

    /// Flushes the group stored under `key`.
    pub async fn flush(&self, key: &str) -> LedgerResult<GroupFlushOutcome> {
        let result = self.try_flush(key).await;

        match &result {
            Ok(outcome) => {
                counter!(ADLEDGER_FLUSH_GROUPS_TOTAL, OUTCOME_LABEL => outcome.as_str())
                    .increment(1);
            }
            Err((stage, _)) => {
                counter!(ADLEDGER_FLUSH_GROUPS_TOTAL, OUTCOME_LABEL => stage.failure_outcome())
                    .increment(1);
            }
        }

        result.map_err(|(_, err)| err)
    }

    async fn try_flush(
        &self,
        key: &str,
    ) -> Result<GroupFlushOutcome, (FlushStage, LedgerError)> {
        let advertisement_id = self.keyspace.parse(key).map_err(|err| {
            error!(%key, error = %err, "skipping malformed counter key");
            (FlushStage::Parse, err)
        })?;

        let deltas = self.counter_store.read_group(key).await.map_err(|err| {
            warn!(
                %key,
                error = %err,
                "failed to read counter group, leaving it for the next cycle"
            );
            (FlushStage::Read, err)
        })?;

        if deltas.is_empty() {
            // Clearing an empty snapshot only removes the group if nothing arrived since.
            let clear = self
                .counter_store
                .clear_group(key, CounterDeltas::default())
                .await
                .map_err(|err| {
                    warn!(%key, error = %err, "failed to remove empty counter group");
                    (FlushStage::Clear, err)
                })?;
            debug!(%key, ?clear, "counter group had nothing to merge");

            return Ok(GroupFlushOutcome::Empty { advertisement_id });
        }

        ledger_fail_point(FLUSH_WORKER__BEFORE_MERGE).map_err(|err| (FlushStage::Merge, err))?;

        let merge = self
            .aggregate_store
            .merge_counts(advertisement_id, deltas)
            .await
            .map_err(|err| {
                warn!(
                    %key,
                    %advertisement_id,
                    error = %err,
                    "failed to merge counter group, leaving it for the next cycle"
                );
                (FlushStage::Merge, err)
            })?;

        if merge == MergeOutcome::AggregateMissing {
            warn!(
                %key,
                %advertisement_id,
                impressions = deltas.impressions,
                clicks = deltas.clicks,
                "advertisement has no ledger row, discarding its counters"
            );
            self.counter_store.delete_group(key).await.map_err(|err| {
                warn!(%key, error = %err, "failed to delete orphaned counter group");
                (FlushStage::Clear, err)
            })?;

            return Ok(GroupFlushOutcome::Orphaned {
                advertisement_id,
                deltas,
            });
        }

        let clear = self.retire(key, deltas).await.map_err(|err| {
            error!(
                %key,
                %advertisement_id,
                impressions = deltas.impressions,
                clicks = deltas.clicks,
                error = %err,
                "counter group merged but not cleared, it will be merged again next cycle"
            );
            (FlushStage::Clear, err)
        })?;

        debug!(
            %key,
            %advertisement_id,
            impressions = deltas.impressions,
            clicks = deltas.clicks,
            ?clear,
            "flushed counter group"
        );

        Ok(GroupFlushOutcome::Merged {
            advertisement_id,
            deltas,
            clear,
        })
    }

    /// Subtracts a committed snapshot from the counter store.
    async fn retire(&self, key: &str, merged: CounterDeltas) -> LedgerResult<GroupClear> {
        ledger_fail_point(FLUSH_WORKER__AFTER_MERGE_COMMIT)?;

        self.counter_store.clear_group(key, merged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::both::memory::MemoryLedgerStore;
    use crate::store::counter::memory::MemoryCounterStore;
    use crate::test_utils::faulty::{FaultyAggregateStore, FaultyCounterStore};
    use crate::types::CounterField;

    async fn setup() -> (MemoryCounterStore, MemoryLedgerStore, AdvertisementId) {
        let counters = MemoryCounterStore::default();
        let ledger = MemoryLedgerStore::new();
        let advertiser = ledger.insert_advertiser("acme", 100.0).await;
        let ad = ledger
            .insert_advertisement_with_id(AdvertisementId::new(42), advertiser.id, "ad")
            .await;

        (counters, ledger, ad.id)
    }

    #[tokio::test]
    async fn test_flush_merges_and_removes_group() {
        let (counters, ledger, id) = setup().await;
        for _ in 0..3 {
            counters.increment(id, CounterField::Impression, 1).await.unwrap();
        }
        counters.increment(id, CounterField::Click, 1).await.unwrap();

        let worker = FlushWorker::new(counters.clone(), ledger.clone(), CounterKeyspace::default());
        let outcome = worker.flush("advertisement:42:counts").await.unwrap();

        assert_eq!(
            outcome,
            GroupFlushOutcome::Merged {
                advertisement_id: id,
                deltas: CounterDeltas::new(3, 1),
                clear: GroupClear::Removed,
            }
        );
        let aggregate = ledger.get_aggregate(id).await.unwrap().unwrap();
        assert_eq!((aggregate.impression_count, aggregate.click_count), (3, 1));
        assert_eq!(counters.group(id).await, None);
    }

    #[tokio::test]
    async fn test_malformed_key_is_left_alone() {
        let (counters, ledger, _) = setup().await;
        counters
            .insert_raw_group("advertisement:oops:counts", CounterDeltas::new(1, 0))
            .await;

        let worker = FlushWorker::new(counters.clone(), ledger, CounterKeyspace::default());
        let err = worker.flush("advertisement:oops:counts").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCounterKey);
        assert_eq!(counters.len().await, 1);
    }

    #[tokio::test]
    async fn test_read_failure_leaves_group_and_ledger_untouched() {
        let (counters, ledger, id) = setup().await;
        counters.increment(id, CounterField::Click, 2).await.unwrap();
        let faulty = FaultyCounterStore::new(counters.clone());
        faulty.fail_reads(true);

        let worker = FlushWorker::new(faulty, ledger.clone(), CounterKeyspace::default());
        assert!(worker.flush("advertisement:42:counts").await.is_err());

        assert_eq!(counters.group(id).await, Some(CounterDeltas::new(0, 2)));
        let aggregate = ledger.get_aggregate(id).await.unwrap().unwrap();
        assert_eq!(aggregate.click_count, 0);
    }

    #[tokio::test]
    async fn test_merge_failure_leaves_group() {
        let (counters, ledger, id) = setup().await;
        counters.increment(id, CounterField::Impression, 5).await.unwrap();
        let faulty = FaultyAggregateStore::new(ledger.clone());
        faulty.set_unreachable(true);

        let worker = FlushWorker::new(counters.clone(), faulty, CounterKeyspace::default());
        let err = worker.flush("advertisement:42:counts").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AggregateStoreConnectionFailed);
        assert_eq!(counters.group(id).await, Some(CounterDeltas::new(5, 0)));
    }

    #[tokio::test]
    async fn test_clear_failure_after_commit_is_merged_again() {
        let (counters, ledger, id) = setup().await;
        counters.increment(id, CounterField::Impression, 2).await.unwrap();
        let faulty = FaultyCounterStore::new(counters.clone());
        faulty.fail_clears(true);

        let worker = FlushWorker::new(faulty.clone(), ledger.clone(), CounterKeyspace::default());
        assert!(worker.flush("advertisement:42:counts").await.is_err());

        faulty.fail_clears(false);
        worker.flush("advertisement:42:counts").await.unwrap();

        let aggregate = ledger.get_aggregate(id).await.unwrap().unwrap();
        assert_eq!(aggregate.impression_count, 4);
        assert_eq!(counters.group(id).await, None);
    }

    #[tokio::test]
    async fn test_orphaned_group_is_discarded() {
        let (counters, ledger, _) = setup().await;
        let unknown = AdvertisementId::new(7);
        counters.increment(unknown, CounterField::Click, 1).await.unwrap();

        let worker = FlushWorker::new(counters.clone(), ledger.clone(), CounterKeyspace::default());
        let outcome = worker.flush("advertisement:7:counts").await.unwrap();

        assert_eq!(
            outcome,
            GroupFlushOutcome::Orphaned {
                advertisement_id: unknown,
                deltas: CounterDeltas::new(0, 1),
            }
        );
        assert!(counters.is_empty().await);
        assert!(ledger.get_aggregate(unknown).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_group_does_not_touch_ledger() {
        let (counters, ledger, id) = setup().await;
        counters
            .insert_raw_group("advertisement:42:counts", CounterDeltas::default())
            .await;
        let faulty = FaultyAggregateStore::new(ledger);

        let worker = FlushWorker::new(counters.clone(), faulty.clone(), CounterKeyspace::default());
        let outcome = worker.flush("advertisement:42:counts").await.unwrap();

        assert_eq!(outcome, GroupFlushOutcome::Empty { advertisement_id: id });
        assert_eq!(faulty.merge_calls(), 0);
        assert!(counters.is_empty().await);
    }
}

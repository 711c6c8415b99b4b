//! Recording of impression and click events.
//!
//! Producers only ever increment the counter store. The ledger is updated later by the
//! flush pipeline.

use metrics::counter;
use tracing::{debug, error};

use crate::error::LedgerResult;
use crate::metrics::{
    ADLEDGER_COUNTER_INCREMENT_FAILURES_TOTAL, ADLEDGER_COUNTER_INCREMENTS_TOTAL, FIELD_LABEL,
};
use crate::store::counter::CounterStore;
use crate::types::{AdvertisementId, CounterField};

/// Records one event for `advertisement_id`.
///
/// The advertisement is not looked up: counts for unknown advertisements are discarded
/// when their group is flushed. Returns the pending count of `field` after the increment.
pub async fn record_event<C>(
    counter_store: &C,
    advertisement_id: AdvertisementId,
    field: CounterField,
) -> LedgerResult<i64>
where
    C: CounterStore,
{
    match counter_store.increment(advertisement_id, field, 1).await {
        Ok(pending) => {
            counter!(ADLEDGER_COUNTER_INCREMENTS_TOTAL, FIELD_LABEL => field.as_str()).increment(1);
            debug!(%advertisement_id, %field, pending, "recorded event");

            Ok(pending)
        }
        Err(err) => {
            counter!(ADLEDGER_COUNTER_INCREMENT_FAILURES_TOTAL, FIELD_LABEL => field.as_str())
                .increment(1);
            error!(%advertisement_id, %field, error = %err, "failed to record event");

            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::counter::memory::MemoryCounterStore;
    use crate::types::CounterDeltas;

    #[tokio::test]
    async fn test_events_accumulate_per_field() {
        let store = MemoryCounterStore::default();
        let id = AdvertisementId::new(42);

        for _ in 0..3 {
            record_event(&store, id, CounterField::Impression).await.unwrap();
        }
        let clicks = record_event(&store, id, CounterField::Click).await.unwrap();

        assert_eq!(clicks, 1);
        assert_eq!(store.group(id).await, Some(CounterDeltas::new(3, 1)));
    }

    #[tokio::test]
    async fn test_concurrent_events_are_all_counted() {
        let store = MemoryCounterStore::default();
        let id = AdvertisementId::new(7);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let store = store.clone();
            tasks.spawn(async move { record_event(&store, id, CounterField::Click).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(store.group(id).await, Some(CounterDeltas::new(0, 50)));
    }
}

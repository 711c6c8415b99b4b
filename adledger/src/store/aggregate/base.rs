use std::future::Future;

use crate::error::LedgerResult;
use crate::types::{AdvertisementAggregate, AdvertisementId, CounterDeltas, MergeOutcome};

/// Durable, transactional store of the authoritative running totals.
pub trait AggregateStore {
    /// Adds `deltas` to the advertisement's counters inside a single transaction.
    ///
    /// The addition is performed by the store itself (`count = count + delta`) and never
    /// as a read-modify-write. On any failure the transaction is rolled back and nothing
    /// is applied. Merging into a missing advertisement commits nothing and reports
    /// [`MergeOutcome::AggregateMissing`].
    fn merge_counts(
        &self,
        advertisement_id: AdvertisementId,
        deltas: CounterDeltas,
    ) -> impl Future<Output = LedgerResult<MergeOutcome>> + Send;

    /// Returns the current running totals of an advertisement.
    fn get_aggregate(
        &self,
        advertisement_id: AdvertisementId,
    ) -> impl Future<Output = LedgerResult<Option<AdvertisementAggregate>>> + Send;
}

use std::future::Future;

use crate::error::LedgerResult;
use crate::types::{AdvertisementId, CounterDeltas, CounterField, GroupClear};

/// Fast store holding pending, not yet flushed counter groups.
///
/// Producers only ever call [`CounterStore::increment`]. The flush pipeline scans, reads
/// and retires groups. Every operation must be atomic on its own; no operation spans
/// more than one group.
pub trait CounterStore {
    /// Atomically adds `by` to `field` of the advertisement's group, creating the group
    /// if absent. Returns the new value of the field.
    fn increment(
        &self,
        advertisement_id: AdvertisementId,
        field: CounterField,
        by: i64,
    ) -> impl Future<Output = LedgerResult<i64>> + Send;

    /// Returns the keys of all groups matching `pattern` at call time.
    ///
    /// Groups created while the listing runs may or may not be included. Keys are unique.
    fn list_pending_group_keys(
        &self,
        pattern: &str,
    ) -> impl Future<Output = LedgerResult<Vec<String>>> + Send;

    /// Reads the current values of a group. Missing groups and fields read as zero.
    fn read_group(&self, key: &str) -> impl Future<Output = LedgerResult<CounterDeltas>> + Send;

    /// Removes a group entirely, including increments that were never read.
    fn delete_group(&self, key: &str) -> impl Future<Output = LedgerResult<()>> + Send;

    /// Atomically subtracts an already merged snapshot from a group.
    ///
    /// Each field is clamped at zero and the group is removed once both fields reach zero.
    /// Increments that landed after the snapshot was read are kept and reported as
    /// [`GroupClear::Retained`].
    fn clear_group(
        &self,
        key: &str,
        merged: CounterDeltas,
    ) -> impl Future<Output = LedgerResult<GroupClear>> + Send;
}

use tracing::debug;

use crate::error::LedgerResult;
use crate::keys::CounterKeyspace;
use crate::store::counter::CounterStore;

/// Enumerates the pending counter groups of one keyspace.
#[derive(Debug, Clone)]
pub struct KeyScanner<C> {
    counter_store: C,
    keyspace: CounterKeyspace,
}

impl<C> KeyScanner<C>
where
    C: CounterStore,
{
    pub fn new(counter_store: C, keyspace: CounterKeyspace) -> Self {
        Self {
            counter_store,
            keyspace,
        }
    }

    /// Returns the keys of every group pending at call time.
    ///
    /// A store failure is returned as is; there is no retry within a cycle.
    pub async fn scan(&self) -> LedgerResult<Vec<String>> {
        let pattern = self.keyspace.pattern();
        let keys = self.counter_store.list_pending_group_keys(&pattern).await?;

        debug!(%pattern, keys = keys.len(), "scanned pending counter groups");

        Ok(keys)
    }
}

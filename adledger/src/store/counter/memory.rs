use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::LedgerResult;
use crate::keys::CounterKeyspace;
use crate::store::counter::CounterStore;
use crate::types::{AdvertisementId, CounterDeltas, CounterField, GroupClear};

/// In-process counter store for tests and local runs.
///
/// Every operation takes the same lock, which gives each one the atomicity a Redis
/// command has.
#[derive(Debug, Clone)]
pub struct MemoryCounterStore {
    keyspace: CounterKeyspace,
    groups: Arc<Mutex<HashMap<String, CounterDeltas>>>,
}

impl MemoryCounterStore {
    pub fn new(keyspace: CounterKeyspace) -> Self {
        Self {
            keyspace,
            groups: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn keyspace(&self) -> &CounterKeyspace {
        &self.keyspace
    }

    /// Returns the group of `advertisement_id`, if one is pending.
    pub async fn group(&self, advertisement_id: AdvertisementId) -> Option<CounterDeltas> {
        let key = self.keyspace.group_key(advertisement_id);
        self.groups.lock().await.get(&key).copied()
    }

    /// Inserts a raw group under an arbitrary key, e.g. a malformed one.
    pub async fn insert_raw_group(&self, key: impl Into<String>, deltas: CounterDeltas) {
        self.groups.lock().await.insert(key.into(), deltas);
    }

    /// Number of pending groups.
    pub async fn len(&self) -> usize {
        self.groups.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.groups.lock().await.is_empty()
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new(CounterKeyspace::default())
    }
}

impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        advertisement_id: AdvertisementId,
        field: CounterField,
        by: i64,
    ) -> LedgerResult<i64> {
        let key = self.keyspace.group_key(advertisement_id);
        let mut groups = self.groups.lock().await;

        let group = groups.entry(key).or_default();
        group.add(field, by);

        Ok(group.get(field))
    }

    async fn list_pending_group_keys(&self, pattern: &str) -> LedgerResult<Vec<String>> {
        let groups = self.groups.lock().await;

        let mut keys = groups
            .keys()
            .filter(|key| glob_matches(pattern, key))
            .cloned()
            .collect::<Vec<_>>();
        keys.sort();

        Ok(keys)
    }

    async fn read_group(&self, key: &str) -> LedgerResult<CounterDeltas> {
        let groups = self.groups.lock().await;

        Ok(groups.get(key).copied().unwrap_or_default())
    }

    async fn delete_group(&self, key: &str) -> LedgerResult<()> {
        self.groups.lock().await.remove(key);

        Ok(())
    }

    async fn clear_group(&self, key: &str, merged: CounterDeltas) -> LedgerResult<GroupClear> {
        let mut groups = self.groups.lock().await;

        let Some(current) = groups.get(key).copied() else {
            return Ok(GroupClear::Removed);
        };

        let remaining = current.saturating_sub(&merged);
        if remaining.is_empty() {
            groups.remove(key);
            return Ok(GroupClear::Removed);
        }

        groups.insert(key.to_string(), remaining);

        Ok(GroupClear::Retained(remaining))
    }
}

/// Matches `key` against a Redis style glob supporting `*` and `?`.
///
/// Character classes are not supported. Group patterns never carry one because a validated
/// namespace cannot hold `[`.
fn glob_matches(pattern: &str, key: &str) -> bool {
    let pattern = pattern.as_bytes();
    let key = key.as_bytes();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` in the pattern and the key position it currently covers.
    let mut star: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, k));
                p += 1;
            }
            Some(&c) if c == b'?' || c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match star {
                Some((star_p, star_k)) => {
                    p = star_p + 1;
                    k = star_k + 1;
                    star = Some((star_p, star_k + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::LedgerResult;
use crate::store::aggregate::AggregateStore;
use crate::store::catalog::AdCatalog;
use crate::types::{
    Advertisement, AdvertisementAggregate, AdvertisementId, Advertiser, AdvertiserId,
    CounterDeltas, MergeOutcome,
};

#[derive(Debug, Default)]
struct Inner {
    advertisers: BTreeMap<AdvertiserId, Advertiser>,
    advertisements: BTreeMap<AdvertisementId, Advertisement>,
    next_advertiser_id: i64,
    next_advertisement_id: i64,
}

/// In-memory ledger implementing both [`AggregateStore`] and [`AdCatalog`].
///
/// Holds everything a Postgres ledger holds. Data is lost when the store is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an advertiser with the next free id.
    pub async fn insert_advertiser(&self, name: &str, budget: f64) -> Advertiser {
        let mut inner = self.inner.lock().await;
        inner.next_advertiser_id += 1;

        let now = Utc::now();
        let advertiser = Advertiser {
            id: AdvertiserId::new(inner.next_advertiser_id),
            name: name.to_string(),
            budget,
            created_at: now,
            updated_at: now,
        };
        inner.advertisers.insert(advertiser.id, advertiser.clone());

        advertiser
    }

    /// Adds an advertisement with zeroed counters and the next free id.
    pub async fn insert_advertisement(
        &self,
        advertiser_id: AdvertiserId,
        title: &str,
        content: &str,
    ) -> Advertisement {
        let mut inner = self.inner.lock().await;
        inner.next_advertisement_id += 1;
        let id = AdvertisementId::new(inner.next_advertisement_id);

        let advertisement = Self::build_advertisement(id, advertiser_id, title, content);
        inner.advertisements.insert(id, advertisement.clone());

        advertisement
    }

    /// Adds an advertisement under a chosen id, replacing any previous one.
    pub async fn insert_advertisement_with_id(
        &self,
        id: AdvertisementId,
        advertiser_id: AdvertiserId,
        title: &str,
    ) -> Advertisement {
        let mut inner = self.inner.lock().await;
        inner.next_advertisement_id = inner.next_advertisement_id.max(id.into_inner());

        let advertisement = Self::build_advertisement(id, advertiser_id, title, "");
        inner.advertisements.insert(id, advertisement.clone());

        advertisement
    }

    fn build_advertisement(
        id: AdvertisementId,
        advertiser_id: AdvertiserId,
        title: &str,
        content: &str,
    ) -> Advertisement {
        let now = Utc::now();
        Advertisement {
            id,
            advertiser_id,
            title: title.to_string(),
            content: content.to_string(),
            impression_count: 0,
            click_count: 0,
            cpm_rate: 0.0,
            cpc_rate: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl AggregateStore for MemoryLedgerStore {
    async fn merge_counts(
        &self,
        advertisement_id: AdvertisementId,
        deltas: CounterDeltas,
    ) -> LedgerResult<MergeOutcome> {
        let mut inner = self.inner.lock().await;

        let Some(advertisement) = inner.advertisements.get_mut(&advertisement_id) else {
            return Ok(MergeOutcome::AggregateMissing);
        };

        advertisement.impression_count += deltas.impressions;
        advertisement.click_count += deltas.clicks;
        advertisement.updated_at = Utc::now();

        Ok(MergeOutcome::Applied)
    }

    async fn get_aggregate(
        &self,
        advertisement_id: AdvertisementId,
    ) -> LedgerResult<Option<AdvertisementAggregate>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .advertisements
            .get(&advertisement_id)
            .map(Advertisement::aggregate))
    }
}

impl AdCatalog for MemoryLedgerStore {
    async fn get_advertiser(
        &self,
        advertiser_id: AdvertiserId,
    ) -> LedgerResult<Option<Advertiser>> {
        let inner = self.inner.lock().await;

        Ok(inner.advertisers.get(&advertiser_id).cloned())
    }

    async fn get_advertisement(
        &self,
        advertisement_id: AdvertisementId,
    ) -> LedgerResult<Option<Advertisement>> {
        let inner = self.inner.lock().await;

        Ok(inner.advertisements.get(&advertisement_id).cloned())
    }

    async fn list_eligible_advertisements(&self) -> LedgerResult<Vec<Advertisement>> {
        let inner = self.inner.lock().await;

        let advertisements = inner
            .advertisements
            .values()
            .filter(|advertisement| {
                inner
                    .advertisers
                    .get(&advertisement.advertiser_id)
                    .is_some_and(|advertiser| advertiser.budget > 0.0)
            })
            .cloned()
            .collect();

        Ok(advertisements)
    }
}

use crate::store::both::memory::MemoryLedgerStore;
use crate::types::{Advertisement, AdvertisementId, Advertiser};

/// A funded advertiser with advertisements under fixed ids.
#[derive(Debug, Clone)]
pub struct SeededLedger {
    pub store: MemoryLedgerStore,
    pub advertiser: Advertiser,
    pub advertisements: Vec<Advertisement>,
}

impl SeededLedger {
    pub fn ids(&self) -> Vec<AdvertisementId> {
        self.advertisements.iter().map(|ad| ad.id).collect()
    }
}

/// Creates a memory ledger with one funded advertiser owning an advertisement per id.
pub async fn seed_ledger(ids: impl IntoIterator<Item = i64>) -> SeededLedger {
    let store = MemoryLedgerStore::new();
    let advertiser = store.insert_advertiser("test advertiser", 1_000.0).await;

    let mut advertisements = Vec::new();
    for id in ids {
        let advertisement = store
            .insert_advertisement_with_id(
                AdvertisementId::new(id),
                advertiser.id,
                &format!("advertisement {id}"),
            )
            .await;
        advertisements.push(advertisement);
    }

    SeededLedger {
        store,
        advertiser,
        advertisements,
    }
}

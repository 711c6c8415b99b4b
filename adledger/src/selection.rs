use rand::seq::SliceRandom;

use crate::error::LedgerResult;
use crate::store::catalog::AdCatalog;
use crate::types::Advertisement;

/// Picks one eligible advertisement uniformly at random, or `None` if there is none.
pub async fn select_advertisement<S>(catalog: &S) -> LedgerResult<Option<Advertisement>>
where
    S: AdCatalog,
{
    let advertisements = catalog.list_eligible_advertisements().await?;

    Ok(choose(&advertisements).cloned())
}

fn choose(advertisements: &[Advertisement]) -> Option<&Advertisement> {
    advertisements.choose(&mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::store::both::memory::MemoryLedgerStore;

    #[tokio::test]
    async fn test_no_eligible_advertisement() {
        let store = MemoryLedgerStore::new();
        let broke = store.insert_advertiser("broke", 0.0).await;
        store.insert_advertisement(broke.id, "t", "c").await;

        assert!(select_advertisement(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_only_eligible_advertisements_are_picked() {
        let store = MemoryLedgerStore::new();
        let funded = store.insert_advertiser("funded", 10.0).await;
        let broke = store.insert_advertiser("broke", 0.0).await;
        let first = store.insert_advertisement(funded.id, "a", "a").await;
        let second = store.insert_advertisement(funded.id, "b", "b").await;
        store.insert_advertisement(broke.id, "c", "c").await;

        let mut picked = HashSet::new();
        for _ in 0..200 {
            let advertisement = select_advertisement(&store).await.unwrap().unwrap();
            picked.insert(advertisement.id);
        }

        assert_eq!(picked, HashSet::from([first.id, second.id]));
    }
}

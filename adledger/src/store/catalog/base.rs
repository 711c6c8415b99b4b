use std::future::Future;

use crate::error::LedgerResult;
use crate::types::{Advertisement, AdvertisementId, Advertiser, AdvertiserId};

/// Read access to advertisers and advertisements for the serving layer.
pub trait AdCatalog {
    fn get_advertiser(
        &self,
        advertiser_id: AdvertiserId,
    ) -> impl Future<Output = LedgerResult<Option<Advertiser>>> + Send;

    fn get_advertisement(
        &self,
        advertisement_id: AdvertisementId,
    ) -> impl Future<Output = LedgerResult<Option<Advertisement>>> + Send;

    /// Returns every advertisement whose advertiser still has a positive budget.
    fn list_eligible_advertisements(
        &self,
    ) -> impl Future<Output = LedgerResult<Vec<Advertisement>>> + Send;
}

//! Core data types shared by the counter stores, the ledger and the flush pipeline.

mod catalog;
mod counters;
mod ids;

pub use catalog::{Advertisement, AdvertisementAggregate, Advertiser};
pub use counters::{CounterDeltas, CounterField, GroupClear, MergeOutcome};
pub use ids::{AdvertisementId, AdvertiserId, CycleId};

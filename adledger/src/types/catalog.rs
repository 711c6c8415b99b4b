use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AdvertisementId, AdvertiserId};

/// An advertiser paying for advertisements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Advertiser {
    pub id: AdvertiserId,
    pub name: String,
    /// Remaining budget. Only advertisers with a positive budget get their ads served.
    pub budget: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An advertisement with its durable counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Advertisement {
    pub id: AdvertisementId,
    pub advertiser_id: AdvertiserId,
    pub title: String,
    pub content: String,
    pub impression_count: i64,
    pub click_count: i64,
    pub cpm_rate: f64,
    pub cpc_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Advertisement {
    pub fn aggregate(&self) -> AdvertisementAggregate {
        AdvertisementAggregate {
            advertisement_id: self.id,
            impression_count: self.impression_count,
            click_count: self.click_count,
        }
    }
}

/// Durable running totals of one advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdvertisementAggregate {
    pub advertisement_id: AdvertisementId,
    pub impression_count: i64,
    pub click_count: i64,
}

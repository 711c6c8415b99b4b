use actix_web::web::{self, ServiceConfig};
use adledger::store::catalog::AdCatalog;
use adledger::store::counter::CounterStore;
use serde::{Deserialize, Serialize};

pub mod ad_request;
pub mod advertisements;
pub mod advertisers;
pub mod events;
pub mod health_check;
pub mod metrics;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Registers the routes that serve advertisements and record their events.
///
/// Expects `Data<C>` and `Data<S>` to be registered as app data.
pub fn configure_api<C, S>(cfg: &mut ServiceConfig)
where
    C: CounterStore + Send + Sync + 'static,
    S: AdCatalog + Send + Sync + 'static,
{
    cfg.service(
        web::scope("/api")
            .route(
                "/advertisers/{id}",
                web::get().to(advertisers::read_advertiser::<S>),
            )
            .route(
                "/advertisements/{id}",
                web::get().to(advertisements::read_advertisement::<S>),
            )
            .route(
                "/advertisements/{id}/impression",
                web::get().to(events::record_impression::<C>),
            )
            .route(
                "/advertisements/{id}/click",
                web::get().to(events::record_click::<C>),
            )
            .route("/ad/request", web::get().to(ad_request::request_ad::<S>)),
    );
}

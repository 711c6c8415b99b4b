use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
    web::{Data, Json},
};
use adledger::error::LedgerError;
use adledger::selection::select_advertisement;
use adledger::store::catalog::AdCatalog;
use adledger::types::{Advertisement, AdvertisementId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::routes::ErrorMessage;

#[derive(Debug, Error)]
pub enum AdRequestError {
    #[error("No advertisements available")]
    NoAdvertisements,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AdRequestError {
    pub fn to_message(&self) -> String {
        match self {
            // Do not expose internal database details in error messages
            AdRequestError::Ledger(_) => "Failed to fetch advertisements".to_string(),
            e => e.to_string(),
        }
    }
}

impl ResponseError for AdRequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdRequestError::NoAdvertisements => StatusCode::NOT_FOUND,
            AdRequestError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(ErrorMessage {
                message: self.to_message(),
            })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackingLinks {
    pub impression: String,
    pub click: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdMarkup {
    pub title: String,
    pub content: String,
    pub tracking_links: TrackingLinks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdResponse {
    pub advertisement_id: AdvertisementId,
    pub adm: AdMarkup,
}

impl From<Advertisement> for AdResponse {
    fn from(advertisement: Advertisement) -> Self {
        let id = advertisement.id;

        Self {
            advertisement_id: id,
            adm: AdMarkup {
                title: advertisement.title,
                content: advertisement.content,
                tracking_links: TrackingLinks {
                    impression: format!("/api/advertisements/{id}/impression"),
                    click: format!("/api/advertisements/{id}/click"),
                },
            },
        }
    }
}

/// Serves a random advertisement of an advertiser with remaining budget.
pub async fn request_ad<S>(catalog: Data<S>) -> Result<Json<AdResponse>, AdRequestError>
where
    S: AdCatalog,
{
    let advertisement = select_advertisement(catalog.get_ref())
        .await
        .inspect_err(|err| error!(error = %err, "failed to select an advertisement"))?
        .ok_or(AdRequestError::NoAdvertisements)?;

    Ok(Json(advertisement.into()))
}

use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
    web::{Data, Json, Path},
};
use adledger::error::LedgerError;
use adledger::store::catalog::AdCatalog;
use adledger::types::{Advertiser, AdvertiserId};
use thiserror::Error;
use tracing::error;

use crate::routes::ErrorMessage;

#[derive(Debug, Error)]
pub enum AdvertiserError {
    #[error("Invalid advertiser ID")]
    InvalidId,

    #[error("Advertiser not found")]
    NotFound(AdvertiserId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AdvertiserError {
    pub fn to_message(&self) -> String {
        match self {
            // Do not expose internal database details in error messages
            AdvertiserError::Ledger(_) => "internal server error".to_string(),
            e => e.to_string(),
        }
    }
}

impl ResponseError for AdvertiserError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdvertiserError::InvalidId => StatusCode::BAD_REQUEST,
            AdvertiserError::NotFound(_) => StatusCode::NOT_FOUND,
            AdvertiserError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
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

pub async fn read_advertiser<S>(
    catalog: Data<S>,
    advertiser_id: Path<String>,
) -> Result<Json<Advertiser>, AdvertiserError>
where
    S: AdCatalog,
{
    let advertiser_id: AdvertiserId = advertiser_id
        .parse()
        .map_err(|_| AdvertiserError::InvalidId)?;

    let advertiser = catalog
        .get_advertiser(advertiser_id)
        .await
        .inspect_err(|err| error!(%advertiser_id, error = %err, "failed to read advertiser"))?
        .ok_or(AdvertiserError::NotFound(advertiser_id))?;

    Ok(Json(advertiser))
}

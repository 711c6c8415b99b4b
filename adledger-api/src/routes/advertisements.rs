use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
    web::{Data, Json, Path},
};
use adledger::error::LedgerError;
use adledger::store::catalog::AdCatalog;
use adledger::types::{Advertisement, AdvertisementId};
use thiserror::Error;
use tracing::error;

use crate::routes::ErrorMessage;

#[derive(Debug, Error)]
pub enum AdvertisementError {
    #[error("Invalid advertisement ID")]
    InvalidId,

    #[error("Advertisement not found")]
    NotFound(AdvertisementId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AdvertisementError {
    pub fn to_message(&self) -> String {
        match self {
            // Do not expose internal database details in error messages
            AdvertisementError::Ledger(_) => "internal server error".to_string(),
            e => e.to_string(),
        }
    }
}

impl ResponseError for AdvertisementError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdvertisementError::InvalidId => StatusCode::BAD_REQUEST,
            AdvertisementError::NotFound(_) => StatusCode::NOT_FOUND,
            AdvertisementError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
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

/// Returns an advertisement with its flushed counters.
///
/// Events still pending in the counter store are not included.
pub async fn read_advertisement<S>(
    catalog: Data<S>,
    advertisement_id: Path<String>,
) -> Result<Json<Advertisement>, AdvertisementError>
where
    S: AdCatalog,
{
    let advertisement_id: AdvertisementId = advertisement_id
        .parse()
        .map_err(|_| AdvertisementError::InvalidId)?;

    let advertisement = catalog
        .get_advertisement(advertisement_id)
        .await
        .inspect_err(|err| {
            error!(%advertisement_id, error = %err, "failed to read advertisement")
        })?
        .ok_or(AdvertisementError::NotFound(advertisement_id))?;

    Ok(Json(advertisement))
}

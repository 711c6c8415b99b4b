use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
    web::{Data, Json, Path},
};
use adledger::error::LedgerError;
use adledger::events::record_event;
use adledger::store::counter::CounterStore;
use adledger::types::{AdvertisementId, CounterField};
use thiserror::Error;

use crate::routes::{ErrorMessage, MessageResponse};

#[derive(Debug, Error)]
pub enum RecordEventError {
    #[error("Invalid advertisement ID")]
    InvalidId,

    #[error("Failed to record {field}")]
    CounterStore {
        field: CounterField,
        #[source]
        source: LedgerError,
    },
}

impl ResponseError for RecordEventError {
    fn status_code(&self) -> StatusCode {
        match self {
            RecordEventError::InvalidId => StatusCode::BAD_REQUEST,
            RecordEventError::CounterStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // The display message never includes the counter store error itself.
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(ErrorMessage {
                message: self.to_string(),
            })
    }
}

pub async fn record_impression<C>(
    counter_store: Data<C>,
    advertisement_id: Path<String>,
) -> Result<Json<MessageResponse>, RecordEventError>
where
    C: CounterStore,
{
    record(counter_store.get_ref(), &advertisement_id, CounterField::Impression).await?;

    Ok(Json(MessageResponse {
        message: "Impression recorded successfully".to_string(),
    }))
}

pub async fn record_click<C>(
    counter_store: Data<C>,
    advertisement_id: Path<String>,
) -> Result<Json<MessageResponse>, RecordEventError>
where
    C: CounterStore,
{
    record(counter_store.get_ref(), &advertisement_id, CounterField::Click).await?;

    Ok(Json(MessageResponse {
        message: "Click recorded successfully".to_string(),
    }))
}

async fn record<C>(
    counter_store: &C,
    advertisement_id: &str,
    field: CounterField,
) -> Result<(), RecordEventError>
where
    C: CounterStore,
{
    let advertisement_id: AdvertisementId = advertisement_id
        .parse()
        .map_err(|_| RecordEventError::InvalidId)?;

    record_event(counter_store, advertisement_id, field)
        .await
        .map_err(|source| RecordEventError::CounterStore { field, source })?;

    Ok(())
}

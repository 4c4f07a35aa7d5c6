use super::types::{ErrorResponse, IMAGE_FIELD, SUCCESS_MESSAGE};
use crate::{Error, pipeline::ReceiptProcessor};
use axum::{
    extract::{
        Multipart, State,
        multipart::{Field, MultipartRejection},
    },
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<ReceiptProcessor>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(error: &Error) -> ApiError {
    (
        error.status_code(),
        Json(ErrorResponse {
            detail: error.public_detail(),
        }),
    )
}

pub async fn health() -> Json<&'static str> {
    Json("OK")
}

pub async fn process_receipt(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<&'static str>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected non-multipart upload: {}", rejection.body_text());
        error_response(&Error::invalid_input(format!(
            "Expected a multipart/form-data upload: {}",
            rejection.body_text()
        )))
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                warn!("Receipt upload without an '{}' field", IMAGE_FIELD);
                return Err(error_response(&Error::invalid_input("No image uploaded")));
            }
            Err(e) => {
                warn!("Failed to read multipart: {}", e);
                return Err(error_response(&Error::invalid_input(format!(
                    "Failed to read multipart: {e}"
                ))));
            }
        };

        if field.name() != Some(IMAGE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        return process_image(&state, field).await;
    }
}

async fn process_image(state: &AppState, field: Field<'_>) -> Result<Json<&'static str>, ApiError> {
    let content_type = field.content_type().map(str::to_string);
    info!(
        "Received receipt upload {:?} ({:?})",
        field.file_name().unwrap_or("unnamed"),
        content_type
    );

    match state
        .processor
        .process(content_type.as_deref(), field.bytes())
        .await
    {
        Ok(processed) => {
            info!(
                "Receipt {} stored {} items",
                processed.receipt_id,
                processed.rows.len()
            );
            Ok(Json(SUCCESS_MESSAGE))
        }
        Err(e) => {
            error!("Failed to process receipt: {}", e);
            Err(error_response(&e))
        }
    }
}

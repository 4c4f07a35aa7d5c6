use serde::{Deserialize, Serialize};

pub const PROCESS_RECEIPT_PATH: &str = "/api/process-receipt";

/// Multipart field carrying the receipt image.
pub const IMAGE_FIELD: &str = "image";

pub const SUCCESS_MESSAGE: &str = "Receipt processed successfully";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

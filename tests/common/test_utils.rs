use super::mocks::{MockExtractor, RecordingSink};
use axum::Router;
use axum_test::{
    TestServer,
    multipart::{MultipartForm, Part},
};
use base64::{Engine as _, engine::general_purpose};
use receipt_scanner::{
    config::{LogsConfig, ServerConfig},
    pipeline::ReceiptProcessor,
    server::{self, handlers::AppState},
};
use std::sync::Arc;

pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// A few bytes that start like a JPEG; nothing decodes them.
pub const JPEG_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF-receipt";

pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 8000,
        allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
        max_upload_bytes: 1024 * 1024,
        logs: LogsConfig {
            level: "debug".to_string(),
        },
    }
}

/// The extractor and sink are cloned into the app; the originals keep
/// sharing their call and batch logs with it.
pub fn create_test_app(extractor: &MockExtractor, sink: &RecordingSink, test_mode: bool) -> Router {
    let processor = ReceiptProcessor::new(
        Arc::new(extractor.clone()),
        Arc::new(sink.clone()),
        test_mode,
    );
    let state = AppState {
        processor: Arc::new(processor),
    };

    server::router(state, &create_test_server_config()).expect("router builds")
}

pub fn create_test_server(
    extractor: &MockExtractor,
    sink: &RecordingSink,
    test_mode: bool,
) -> TestServer {
    TestServer::new(create_test_app(extractor, sink, test_mode)).expect("test server starts")
}

pub fn image_form(bytes: &[u8], mime_type: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "image",
        Part::bytes(bytes.to_vec())
            .file_name("receipt.jpg")
            .mime_type(mime_type),
    )
}

pub fn encode(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Single-row extraction output in the model's format.
pub fn receipt_csv(item: &str, price: &str, location: &str) -> String {
    format!(
        "ID,Item Name,Item Category,Item Price,Location,Date\n1,{item},Grocery,{price},{location},2025-03-14"
    )
}

pub mod handlers;
pub mod types;

pub use types::{ErrorResponse, PROCESS_RECEIPT_PATH};

use crate::{
    Error, Result,
    config::{Config, ServerConfig},
    llm::OpenAiExtractor,
    pipeline::ReceiptProcessor,
    storage::PgItemSink,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use handlers::AppState;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Builds the HTTP router around an already-wired processor.
pub fn router(state: AppState, server: &ServerConfig) -> Result<Router> {
    let cors = cors_layer(&server.allowed_origins)?;

    Ok(Router::new()
        .route("/", get(handlers::health))
        .route(PROCESS_RECEIPT_PATH, post(handlers::process_receipt))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Credentialed CORS cannot use wildcards, so methods and headers mirror the
/// preflight request and a `*` origin mirrors the caller's origin.
fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|e| {
                    Error::config(format!("Invalid origin '{origin}' in ALLOWED_ORIGINS: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

pub async fn run(config: Config) -> Result<()> {
    let extractor = Arc::new(OpenAiExtractor::new(config.llm.clone())?);
    let sink = Arc::new(PgItemSink::connect(&config.database).await?);

    if config.is_test {
        warn!("Test mode enabled: uploads are answered with the sample table");
    }

    let processor = ReceiptProcessor::new(extractor, sink, config.is_test);
    let app_state = AppState {
        processor: Arc::new(processor),
    };

    let app = router(app_state, &config.server)?;

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

use anyhow::Result;
use receipt_scanner::{config, server};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

/// Validates that a log level string is valid. Python-style `warning` and
/// `critical` map to `warn` and `error`.
fn validate_log_level(level: &str) -> Result<LevelFilter> {
    let lowered = level.to_ascii_lowercase();
    let normalized = match lowered.as_str() {
        "warning" => "warn",
        "critical" | "fatal" => "error",
        other => other,
    };

    normalized.parse::<LevelFilter>().map_err(|_| {
        anyhow::anyhow!(
            "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
            level
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (before logging setup)
    let config = match config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG overrides LOG_LEVEL when set
    let rust_log = std::env::var("RUST_LOG").ok().filter(|v| !v.is_empty());
    let log_level = config.server.logs.level.clone();

    let default_level = match validate_log_level(&log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let env_filter = match rust_log {
        Some(directives) => match tracing_subscriber::EnvFilter::try_new(&directives) {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!("Invalid RUST_LOG '{}': {}", directives, e);
                std::process::exit(1);
            }
        },
        None => tracing_subscriber::EnvFilter::default().add_directive(default_level.into()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .init();

    info!("Starting receipt scanner with log level: {}", log_level);
    info!("Configuration loaded successfully");

    server::run(config).await?;

    Ok(())
}

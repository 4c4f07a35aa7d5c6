use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Processing failure: {0}")]
    Processing(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status reported to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing detail. Client errors carry their reason, server-side
    /// failures only name the stage that failed.
    pub fn public_detail(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::Upstream(_) | Self::OpenAi(_) | Self::Network(_) => {
                "Error communicating with inference service".to_string()
            }
            Self::Processing(msg) => format!("Error processing extraction output: {msg}"),
            Self::Csv(e) => format!("Error processing extraction output: {e}"),
            Self::Storage(_) | Self::Database(_) => {
                "Error writing items to database".to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

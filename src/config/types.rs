use std::time::Duration;

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    /// Substitute the canned sample table for the inference call.
    pub is_test: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub logs: LogsConfig,
}

#[derive(Debug, Clone)]
pub struct LogsConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Empty means the provider's default endpoint.
    pub base_url: String,
    pub api_key: String,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
    pub max_connections: u32,
    pub timeout: Duration,
}

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: &str = "8000";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_POSTGRES_PORT: &str = "5432";
pub const DEFAULT_MAX_CONNECTIONS: &str = "5";
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: &str = "30";
pub const DEFAULT_STORAGE_TIMEOUT_SECS: &str = "10";
pub const DEFAULT_MAX_UPLOAD_BYTES: &str = "20971520";

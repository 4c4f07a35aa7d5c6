mod types;

pub use types::*;

use crate::{Error, Result};
use std::{collections::HashMap, env, fmt::Display, str::FromStr, time::Duration};
use tracing::debug;

/// Looks up settings by name, falling back to a `{NAME}_FILE` path whose
/// contents hold the value (mounted secrets), then to a default.
pub struct Resolver {
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl Resolver {
    pub fn from_env() -> Self {
        Self {
            lookup: Box::new(|name: &str| env::var(name).ok()),
        }
    }

    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self {
            lookup: Box::new(move |name: &str| vars.get(name).cloned()),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.is_empty())
    }

    pub async fn optional(&self, name: &str) -> Result<Option<String>> {
        if let Some(value) = self.var(name) {
            return Ok(Some(value));
        }

        let file_var = format!("{name}_FILE");
        if let Some(path) = self.var(&file_var) {
            debug!("Reading {} from {}", name, path);
            let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
                Error::config(format!("Cannot read {file_var} at '{path}': {e}"))
            })?;
            return Ok(Some(contents.trim_end().to_string()));
        }

        Ok(None)
    }

    pub async fn resolve(&self, name: &str, default: Option<&str>) -> Result<String> {
        match self.optional(name).await? {
            Some(value) => Ok(value),
            None => default
                .map(str::to_string)
                .ok_or_else(|| Error::config(format!("Missing env value for {name}"))),
        }
    }

    pub async fn required(&self, name: &str) -> Result<String> {
        self.resolve(name, None).await
    }

    /// Like [`Resolver::required`], but yields an empty value when `relaxed`.
    pub async fn required_unless(&self, name: &str, relaxed: bool) -> Result<String> {
        if relaxed {
            Ok(self.optional(name).await?.unwrap_or_default())
        } else {
            self.required(name).await
        }
    }

    pub async fn parsed<T>(&self, name: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.resolve(name, Some(default)).await?;
        raw.trim()
            .parse()
            .map_err(|e| Error::config(format!("Invalid value '{raw}' for {name}: {e}")))
    }

    /// True only for a case-insensitive `"true"`.
    pub fn flag(&self, name: &str) -> bool {
        self.var(name)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }
}

/// Loads configuration from the process environment.
pub async fn load() -> Result<Config> {
    Config::from_resolver(&Resolver::from_env()).await
}

impl Config {
    pub async fn from_resolver(resolver: &Resolver) -> Result<Self> {
        let is_test = resolver.flag("IS_TEST");
        debug!("Test mode: {}", is_test);

        let allowed_origins = resolver
            .required("ALLOWED_ORIGINS")
            .await?
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let server = ServerConfig {
            host: resolver.resolve("HOST", Some(DEFAULT_HOST)).await?,
            port: resolver.parsed("PORT", DEFAULT_PORT).await?,
            allowed_origins,
            max_upload_bytes: resolver
                .parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)
                .await?,
            logs: LogsConfig {
                level: resolver
                    .resolve("LOG_LEVEL", Some(DEFAULT_LOG_LEVEL))
                    .await?
                    .to_lowercase(),
            },
        };

        let llm = LlmConfig {
            base_url: resolver.optional("OPENAI_BASE_URL").await?.unwrap_or_default(),
            api_key: resolver.required_unless("GPT_API_KEY", is_test).await?,
            organization: resolver.optional("ORGANZIATION_KEY").await?,
            project: resolver.optional("PROJECT_KEY").await?,
            model: resolver.resolve("MODEL_NAME", Some(DEFAULT_MODEL)).await?,
            system_prompt: resolver.required_unless("SYSTEM_PROMPT", is_test).await?,
            user_prompt: resolver.required_unless("USER_PROMPT", is_test).await?,
            timeout: Duration::from_secs(
                resolver
                    .parsed("INFERENCE_TIMEOUT_SECS", DEFAULT_INFERENCE_TIMEOUT_SECS)
                    .await?,
            ),
        };

        let database = DatabaseConfig {
            host: resolver.required("POSTGRES_HOST").await?,
            port: resolver.parsed("POSTGRES_PORT", DEFAULT_POSTGRES_PORT).await?,
            user: resolver.required("POSTGRES_USER").await?,
            password: resolver.required("POSTGRES_PASSWORD").await?,
            database: resolver.required("POSTGRES_DB").await?,
            table: resolver.required("POSTGRES_TABLE").await?,
            max_connections: resolver
                .parsed("POSTGRES_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)
                .await?,
            timeout: Duration::from_secs(
                resolver
                    .parsed("STORAGE_TIMEOUT_SECS", DEFAULT_STORAGE_TIMEOUT_SECS)
                    .await?,
            ),
        };

        Ok(Self {
            server,
            llm,
            database,
            is_test,
        })
    }
}

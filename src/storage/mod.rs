use crate::{
    Error, Result,
    config::DatabaseConfig,
    table::{COLUMNS, ItemRow},
};
use async_trait::async_trait;
use sqlx::{
    PgPool, Postgres, QueryBuilder,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Rows per INSERT statement; keeps binds under the Postgres limit of 65535.
const ROWS_PER_STATEMENT: usize = 1000;

/// Appends parsed receipt rows to durable storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemSink: Send + Sync {
    async fn append(&self, rows: &[ItemRow]) -> Result<()>;
}

/// Writes rows into an existing Postgres table, one transaction per batch.
pub struct PgItemSink {
    pool: PgPool,
    table: String,
    timeout: Duration,
}

impl PgItemSink {
    pub fn new(pool: PgPool, table: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pool,
            table: table.into(),
            timeout,
        }
    }

    /// Opens the connection pool eagerly so a bad database config fails at startup.
    #[instrument(skip_all, fields(host = %config.host, database = %config.database))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = pool_options(config)
            .connect_with(connect_options(config))
            .await?;

        info!("PostgreSQL connection pool established");
        Ok(Self::new(pool, config.table.clone(), config.timeout))
    }

    /// Builds the pool without connecting; connections open on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = pool_options(config).connect_lazy_with(connect_options(config));
        Self::new(pool, config.table.clone(), config.timeout)
    }

    async fn insert(&self, rows: &[ItemRow]) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(insert_prefix(&self.table));
            builder.push_values(chunk, |mut values, row| {
                values
                    .push_bind(row.item_name.clone())
                    .push_bind(row.item_category.clone())
                    .push_bind(row.item_price)
                    .push_bind(row.location.clone())
                    .push_bind(row.date);
            });

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await
    }
}

#[async_trait]
impl ItemSink for PgItemSink {
    #[instrument(skip_all, fields(table = %self.table, rows = rows.len()))]
    async fn append(&self, rows: &[ItemRow]) -> Result<()> {
        if rows.is_empty() {
            debug!("No rows to write");
            return Ok(());
        }

        match tokio::time::timeout(self.timeout, self.insert(rows)).await {
            Ok(Ok(())) => {
                info!("Wrote {} rows", rows.len());
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Error writing rows to DB: {}", e);
                Err(Error::storage(e.to_string()))
            }
            Err(_) => {
                error!("DB write timed out after {:?}", self.timeout);
                Err(Error::storage(format!(
                    "Database write timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.timeout)
}

fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
}

/// Quotes a possibly schema-qualified table name, e.g. `public.items`.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn insert_prefix(table: &str) -> String {
    let columns = COLUMNS
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");

    format!("INSERT INTO {} ({}) ", quote_identifier(table), columns)
}

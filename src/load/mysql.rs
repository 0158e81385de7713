// src/load/mysql.rs
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, QueryBuilder};
use std::time::Duration;
use tracing::debug;

use super::{validate_identifier, RelationalStore};
use crate::config::DatabaseConfig;
use crate::dataset::{CanonicalRecord, FieldValue};
use crate::error::{EtlError, EtlResult, LoadStage, StoreError};

fn quoted(name: &str) -> Result<String, StoreError> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name))
}

/// MySQL-backed store. Every operation checks out its own connection and
/// runs inside its own transaction.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(cfg: &DatabaseConfig) -> EtlResult<Self> {
        let options = MySqlConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.database)
            .charset("utf8mb4");
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| EtlError::load(LoadStage::Connect, e.into()))?;
        debug!(host = %cfg.host, database = %cfg.database, "connected");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl RelationalStore for MySqlStore {
    async fn truncate(&self, table: &str) -> Result<(), StoreError> {
        let stmt = format!("TRUNCATE TABLE {}", quoted(table)?);
        let mut tx = self.pool.begin().await?;
        sqlx::query(&stmt).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[CanonicalRecord],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let cols = columns
            .iter()
            .map(|c| quoted(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let mut qb: QueryBuilder<MySql> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", quoted(table)?, cols));
        qb.push_values(rows, |mut b, record| {
            for value in record.values() {
                match value {
                    FieldValue::Missing => b.push_bind(None::<String>),
                    FieldValue::Text(s) => b.push_bind(s.clone()),
                    FieldValue::Money(d) => b.push_bind(*d),
                    FieldValue::Date(d) => b.push_bind(*d),
                };
            }
        });

        let mut tx = self.pool.begin().await?;
        let result = qb.build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn run_procedure(&self, name: &str, wait_timeout: Duration) -> Result<(), StoreError> {
        let call = format!("CALL {}()", quoted(name)?);
        let set_timeout = format!("SET SESSION wait_timeout = {}", wait_timeout.as_secs());

        // same connection for both statements, the timeout is session scoped
        let mut tx = self.pool.begin().await?;
        sqlx::query(&set_timeout).execute(&mut *tx).await?;
        sqlx::query(&call).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

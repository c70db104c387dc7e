//! Query execution
//!
//! `WarehouseEngine` is the contract every execution backend implements.
//! The Postgres engine opens a dedicated connection per request, runs the
//! statement under a timeout, and releases the connection on success,
//! failure, and timeout alike. Only validated SQL reaches this layer.

use crate::config::WarehouseConfig;
use crate::error::{NlqError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, Connection, PgConnection, Row, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-request execution parameters.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub timeout: Duration,
    /// Cap on rows returned to the caller; excess rows are dropped with a
    /// warning on the result.
    pub row_limit: Option<usize>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            row_limit: None,
        }
    }
}

/// Tabular result: named columns, rows of JSON values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub engine: String,
    pub warnings: Vec<String>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>, engine: String) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms: 0,
            engine,
            warnings: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value at (row, column name), if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&serde_json::Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    fn truncate_to(&mut self, limit: usize) {
        if self.rows.len() > limit {
            self.rows.truncate(limit);
            self.row_count = limit;
            self.warnings
                .push(format!("Result truncated to {} rows", limit));
        }
    }
}

/// Execution backend contract.
#[async_trait]
pub trait WarehouseEngine: Send + Sync {
    /// Engine name, e.g. "postgres".
    fn name(&self) -> &'static str;

    /// Execute a validated SQL statement.
    async fn execute(&self, sql: &str, ctx: &ExecutionContext) -> Result<QueryResult>;

    /// Probe connectivity.
    async fn health_check(&self) -> Result<bool>;
}

/// PostgreSQL-backed warehouse engine with a scoped connection per request.
pub struct PostgresEngine {
    options: PgConnectOptions,
}

impl PostgresEngine {
    pub fn new(config: &WarehouseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.account)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .application_name(&config.warehouse)
            .options([("search_path", config.schema.as_str())]);
        Self { options }
    }

    async fn connect(&self) -> Result<PgConnection> {
        PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| NlqError::Execution(format!("Failed to connect to warehouse: {}", e)))
    }
}

#[async_trait]
impl WarehouseEngine for PostgresEngine {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn execute(&self, sql: &str, ctx: &ExecutionContext) -> Result<QueryResult> {
        let start = Instant::now();
        debug!("Executing statement: {}", sql);

        let mut conn = self.connect().await?;
        let outcome = tokio::time::timeout(ctx.timeout, sqlx::query(sql).fetch_all(&mut conn)).await;

        // The connection is released before the outcome is surfaced, on
        // every path including driver errors and timeout.
        if let Err(e) = conn.close().await {
            debug!("Connection close failed: {}", e);
        }

        let pg_rows = match outcome {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                return Err(NlqError::Execution(format!("Query failed: {}", e)));
            }
            Err(_) => {
                return Err(NlqError::Execution(format!(
                    "Query timed out after {}s",
                    ctx.timeout.as_secs()
                )));
            }
        };

        let columns: Vec<String> = pg_rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows: Vec<Vec<serde_json::Value>> = pg_rows.iter().map(decode_row).collect();

        let mut result = QueryResult::new(columns, rows, self.name().to_string());
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        if let Some(limit) = ctx.row_limit {
            result.truncate_to(limit);
        }

        info!(
            "Query returned {} rows in {}ms",
            result.row_count, result.execution_time_ms
        );
        Ok(result)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connect().await?;
        let probe = sqlx::query("SELECT 1").execute(&mut conn).await;
        if let Err(e) = conn.close().await {
            debug!("Connection close failed: {}", e);
        }
        probe
            .map(|_| true)
            .map_err(|e| NlqError::Execution(format!("Health check failed: {}", e)))
    }
}

fn decode_row(row: &PgRow) -> Vec<serde_json::Value> {
    (0..row.columns().len())
        .map(|idx| decode_column(row, idx))
        .collect()
}

/// Decode a single column into a JSON value. Types without a native mapping
/// fall back to their text form; undecodable values become null.
fn decode_column(row: &PgRow, idx: usize) -> serde_json::Value {
    use serde_json::Value;

    let type_name = row.columns()[idx].type_info().name().to_uppercase();
    match type_name.as_str() {
        "BOOL" => opt_json(row.try_get::<Option<bool>, _>(idx)),
        "INT2" => opt_json(row.try_get::<Option<i16>, _>(idx)),
        "INT4" => opt_json(row.try_get::<Option<i32>, _>(idx)),
        "INT8" => opt_json(row.try_get::<Option<i64>, _>(idx)),
        "FLOAT4" => opt_json(row.try_get::<Option<f32>, _>(idx)),
        "FLOAT8" => opt_json(row.try_get::<Option<f64>, _>(idx)),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            opt_json(row.try_get::<Option<String>, _>(idx))
        }
        "UUID" => match row.try_get::<Option<uuid::Uuid>, _>(idx) {
            Ok(Some(v)) => Value::String(v.to_string()),
            _ => Value::Null,
        },
        "DATE" => match row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            Ok(Some(v)) => Value::String(v.to_string()),
            _ => Value::Null,
        },
        "TIMESTAMP" => match row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            Ok(Some(v)) => Value::String(v.to_string()),
            _ => Value::Null,
        },
        "TIMESTAMPTZ" => match row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            Ok(Some(v)) => Value::String(v.to_rfc3339()),
            _ => Value::Null,
        },
        _ => opt_json(row.try_get::<Option<String>, _>(idx)),
    }
}

fn opt_json<T: Into<serde_json::Value>>(
    value: std::result::Result<Option<T>, sqlx::Error>,
) -> serde_json::Value {
    match value {
        Ok(Some(v)) => v.into(),
        _ => serde_json::Value::Null,
    }
}

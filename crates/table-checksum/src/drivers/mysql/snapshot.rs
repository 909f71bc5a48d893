//! MySQL/MariaDB table snapshot.
//!
//! One dedicated SQLx connection per side, inside a read-only
//! `WITH CONSISTENT SNAPSHOT` transaction that lasts until [`close`] rolls it
//! back. Batches are read over the text protocol so every column arrives as
//! the bytes the server renders, which is what gets digested.
//!
//! [`close`]: TableSnapshot::close

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Executor as _, Row as _};
use tracing::{debug, info, warn};

use super::dialect::{KeyKind, MysqlDialect, ISOLATION_SQL, ROLLBACK_SQL, START_SNAPSHOT_SQL};
use crate::config::ConnectionConfig;
use crate::core::{
    BatchRequest, KeyValue, MetadataProvider, RawValue, Row, RowBatchProvider, TableMetadata,
    TableRef, TableSnapshot,
};
use crate::error::{ChecksumError, Result};

/// Read-consistent view of one MySQL database.
pub struct MysqlSnapshot {
    conn: Option<MySqlConnection>,
    dialect: MysqlDialect,
    description: String,
    /// Set by `table_metadata`.
    key_kind: Option<KeyKind>,
}

impl MysqlSnapshot {
    /// Connect and start the snapshot transaction.
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        let description = config.redacted_url();
        let mut conn = connect(config).await?;

        sqlx::raw_sql(ISOLATION_SQL)
            .execute(&mut conn)
            .await
            .map_err(|e| ChecksumError::connection(e, format!("setting isolation on {}", description)))?;
        sqlx::raw_sql(START_SNAPSHOT_SQL)
            .execute(&mut conn)
            .await
            .map_err(|e| ChecksumError::connection(e, format!("starting snapshot on {}", description)))?;

        info!("Opened consistent snapshot on {}", description);

        Ok(Self {
            conn: Some(conn),
            dialect: MysqlDialect::new(),
            description,
            key_kind: None,
        })
    }

    /// Connect, run `SELECT VERSION()`, and report the server version and latency.
    pub async fn ping(config: &ConnectionConfig) -> Result<(String, Duration)> {
        let start = Instant::now();
        let mut conn = connect(config).await?;
        let rows = sqlx::raw_sql("SELECT VERSION()")
            .fetch_all(&mut conn)
            .await
            .map_err(|e| ChecksumError::connection(e, format!("pinging {}", config.redacted_url())))?;
        let version = match rows.first() {
            Some(row) => text_at(row, 0)?.unwrap_or_default(),
            None => String::new(),
        };
        let latency = start.elapsed();
        if let Err(e) = conn.close().await {
            debug!("Closing health-check connection failed: {}", e);
        }
        Ok((version, latency))
    }

    fn conn(&mut self) -> Result<&mut MySqlConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ChecksumError::Internal(format!("snapshot on {} already closed", self.description)))
    }
}

async fn connect(config: &ConnectionConfig) -> Result<MySqlConnection> {
    let options = MySqlConnectOptions::from_str(&config.url)
        .map_err(|e| ChecksumError::connection(e, format!("parsing URL {}", config.redacted_url())))?;
    MySqlConnection::connect_with(&options)
        .await
        .map_err(|e| ChecksumError::connection(e, format!("connecting to {}", config.redacted_url())))
}

/// Column `idx` as the raw bytes the server sent; `None` for NULL.
fn raw_at(row: &MySqlRow, idx: usize) -> Result<RawValue> {
    row.try_get_unchecked(idx)
        .map_err(|e| ChecksumError::Internal(format!("decoding column {}: {}", idx, e)))
}

/// Catalog column `idx` as text; `None` for NULL.
fn text_at(row: &MySqlRow, idx: usize) -> Result<Option<String>> {
    Ok(raw_at(row, idx)?.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

/// Decode a primary key from its text-protocol bytes.
///
/// Text keys must be valid UTF-8: the connection character set is utf8mb4, so
/// anything else means the server did not convert the column.
fn decode_key(table: &TableRef, column: &str, kind: &KeyKind, raw: Option<&[u8]>) -> Result<KeyValue> {
    let Some(raw) = raw else {
        return Err(ChecksumError::scan(table.full_name(), column, "NULL primary key"));
    };
    match kind {
        KeyKind::Binary => Ok(KeyValue::Bytes(raw.to_vec())),
        KeyKind::Text | KeyKind::CollatedText { .. } => String::from_utf8(raw.to_vec())
            .map(KeyValue::Text)
            .map_err(|e| {
                ChecksumError::scan(
                    table.full_name(),
                    format!("0x{}", hex::encode(raw)),
                    format!("key is not valid UTF-8: {}", e),
                )
            }),
        KeyKind::Integer => std::str::from_utf8(raw)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .map(KeyValue::Int)
            .ok_or_else(|| ChecksumError::UnsupportedKey {
                table: table.full_name(),
                column: column.to_string(),
                reason: format!(
                    "keys outside the signed 64-bit range ({})",
                    String::from_utf8_lossy(raw)
                ),
            }),
    }
}

#[async_trait]
impl MetadataProvider for MysqlSnapshot {
    async fn table_metadata(&mut self, table: &TableRef) -> Result<TableMetadata> {
        let full_name = table.full_name();
        let status_sql = self.dialect.table_status_query();
        let pk_sql = self.dialect.primary_key_query();
        let conn = self.conn()?;

        let status = sqlx::query(status_sql)
            .bind(table.schema.as_deref())
            .bind(&table.name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| ChecksumError::query(&full_name, e))?
            .ok_or_else(|| ChecksumError::NotFound(full_name.clone()))?;

        let engine = text_at(&status, 0)?.unwrap_or_default();
        let version = text_at(&status, 1)?.unwrap_or_default();
        let row_format = text_at(&status, 2)?.unwrap_or_default();

        let pk = sqlx::query(pk_sql)
            .bind(table.schema.as_deref())
            .bind(&table.name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| ChecksumError::query(&full_name, e))?
            .ok_or_else(|| ChecksumError::NoPrimaryKey(full_name.clone()))?;

        let key_column = text_at(&pk, 0)?.ok_or_else(|| ChecksumError::NoPrimaryKey(full_name.clone()))?;
        let data_type = text_at(&pk, 1)?.unwrap_or_default();
        let charset = text_at(&pk, 2)?;
        let collation = text_at(&pk, 3)?;
        let kind = KeyKind::classify(&data_type, charset.as_deref(), collation.as_deref())
            .ok_or_else(|| ChecksumError::UnsupportedKey {
                table: full_name.clone(),
                column: key_column.clone(),
                reason: format!("{} keys do not sort by their text rendering", data_type),
            })?;

        let bounds_sql = self.dialect.key_bounds_query(table, &key_column, &kind);
        let conn = self.conn()?;
        let bounds = conn
            .fetch_all(sqlx::raw_sql(&bounds_sql))
            .await
            .map_err(|e| ChecksumError::query(&full_name, e))?;
        let (min, max) = match bounds.first() {
            Some(row) => (raw_at(row, 0)?, raw_at(row, 1)?),
            None => (None, None),
        };
        let (Some(min), Some(max)) = (min, max) else {
            return Err(ChecksumError::EmptyTable(full_name));
        };

        let metadata = TableMetadata {
            engine,
            version,
            row_format,
            min_key_value: decode_key(table, &key_column, &kind, Some(min.as_slice()))?,
            max_key_value: decode_key(table, &key_column, &kind, Some(max.as_slice()))?,
            primary_key_column: key_column,
        };
        debug!(
            "{}: key {} ({}, {:?}), range {}..={}",
            full_name, metadata.primary_key_column, data_type, kind, metadata.min_key_value, metadata.max_key_value
        );
        self.key_kind = Some(kind);
        Ok(metadata)
    }
}

#[async_trait]
impl RowBatchProvider for MysqlSnapshot {
    async fn fetch_batch(&mut self, table: &TableRef, request: &BatchRequest) -> Result<Vec<Row>> {
        let full_name = table.full_name();
        let kind = self.key_kind.clone().ok_or_else(|| {
            ChecksumError::Internal(format!("batch of {} requested before its metadata", full_name))
        })?;
        let sql = self.dialect.batch_query(table, request, &kind);
        debug!("{}: {}", full_name, sql);

        let conn = self.conn()?;
        let rows = conn
            .fetch_all(sqlx::raw_sql(&sql))
            .await
            .map_err(|e| ChecksumError::query(&full_name, e))?;

        let mut batch = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw_key: RawValue = row
                .try_get_unchecked(request.key_column.as_str())
                .map_err(|e| ChecksumError::scan(&full_name, "key column", e.to_string()))?;
            let key = decode_key(table, &request.key_column, &kind, raw_key.as_deref())?;

            let mut columns: Vec<RawValue> = Vec::with_capacity(row.len());
            for idx in 0..row.len() {
                let value: RawValue = row
                    .try_get_unchecked(idx)
                    .map_err(|e| ChecksumError::scan(&full_name, &key, format!("column {}: {}", idx, e)))?;
                columns.push(value);
            }
            batch.push(Row { key, columns });
        }

        Ok(batch)
    }
}

#[async_trait]
impl TableSnapshot for MysqlSnapshot {
    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn close(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if let Err(e) = conn.execute(sqlx::raw_sql(ROLLBACK_SQL)).await {
            warn!("Rollback on {} failed: {}", self.description, e);
        }
        if let Err(e) = conn.close().await {
            warn!("Closing connection to {} failed: {}", self.description, e);
        }
        debug!("Closed snapshot on {}", self.description);
    }
}

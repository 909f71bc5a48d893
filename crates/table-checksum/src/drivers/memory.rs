//! In-memory table snapshot.
//!
//! Holds a table as rows sorted by key and answers metadata and batch requests
//! the way a database would. Used by embedders that already have the rows in
//! hand and by the pipeline tests, which can inject failures and count fetches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::{
    BatchRequest, LowerBound, MetadataProvider, Row, RowBatchProvider, TableMetadata, TableRef,
    TableSnapshot, UpperBound,
};
use crate::error::{ChecksumError, Result};

/// A table held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    key_column: Option<String>,
    rows: Vec<Row>,
    exists: bool,
    engine: String,
    version: String,
    row_format: String,
    fail_at_batch: Option<usize>,
    fetches: Arc<AtomicUsize>,
    closed: bool,
}

impl MemoryTable {
    /// Create a table; rows are sorted by key.
    pub fn new(name: impl Into<String>, key_column: impl Into<String>, mut rows: Vec<Row>) -> Self {
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            name: name.into(),
            key_column: Some(key_column.into()),
            rows,
            exists: true,
            engine: "InnoDB".to_string(),
            version: "10".to_string(),
            row_format: "Dynamic".to_string(),
            fail_at_batch: None,
            fetches: Arc::new(AtomicUsize::new(0)),
            closed: false,
        }
    }

    /// Two-column table `(id, value)` keyed on `id`.
    pub fn with_text_rows(name: impl Into<String>, rows: &[(i64, &str)]) -> Self {
        let rows = rows
            .iter()
            .map(|(id, value)| {
                let id_text = id.to_string();
                Row::from_text(*id, &[Some(id_text.as_str()), Some(*value)])
            })
            .collect();
        Self::new(name, "id", rows)
    }

    /// A table that does not exist.
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            exists: false,
            ..Self::new(name, "id", Vec::new())
        }
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_row_format(mut self, row_format: impl Into<String>) -> Self {
        self.row_format = row_format.into();
        self
    }

    /// Drop the primary key.
    pub fn without_primary_key(mut self) -> Self {
        self.key_column = None;
        self
    }

    /// Fail the fetch with this zero-based index.
    pub fn fail_at_batch(mut self, index: usize) -> Self {
        self.fail_at_batch = Some(index);
        self
    }

    /// Shared counter of batch fetches; stays readable after the table moves.
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetches)
    }

    /// Replace the columns of the row with this key.
    pub fn update_row(&mut self, row: Row) {
        match self.rows.binary_search_by(|r| r.key.cmp(&row.key)) {
            Ok(pos) => self.rows[pos] = row,
            Err(pos) => self.rows.insert(pos, row),
        }
    }

    /// Remove the row with this key, if present.
    pub fn delete_row(&mut self, key: &crate::core::KeyValue) {
        self.rows.retain(|r| &r.key != key);
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_table(&self, table: &TableRef) -> Result<()> {
        if !self.exists || table.name != self.name {
            return Err(ChecksumError::NotFound(table.full_name()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for MemoryTable {
    async fn table_metadata(&mut self, table: &TableRef) -> Result<TableMetadata> {
        self.check_table(table)?;

        let Some(key_column) = self.key_column.clone() else {
            return Err(ChecksumError::NoPrimaryKey(table.full_name()));
        };
        let (Some(first), Some(last)) = (self.rows.first(), self.rows.last()) else {
            return Err(ChecksumError::EmptyTable(table.full_name()));
        };

        Ok(TableMetadata {
            engine: self.engine.clone(),
            version: self.version.clone(),
            row_format: self.row_format.clone(),
            primary_key_column: key_column,
            min_key_value: first.key.clone(),
            max_key_value: last.key.clone(),
        })
    }
}

#[async_trait]
impl RowBatchProvider for MemoryTable {
    async fn fetch_batch(&mut self, table: &TableRef, request: &BatchRequest) -> Result<Vec<Row>> {
        self.check_table(table)?;

        let index = self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_at_batch == Some(index) {
            return Err(ChecksumError::query(
                table.full_name(),
                format!("injected failure at batch {}", index),
            ));
        }
        if self.key_column.as_deref() != Some(request.key_column.as_str()) {
            return Err(ChecksumError::query(
                table.full_name(),
                format!("unknown key column {}", request.key_column),
            ));
        }

        let above_lower = |row: &&Row| match &request.lower {
            LowerBound::Start => true,
            LowerBound::After(k) => row.key > *k,
            LowerBound::From(k) => row.key >= *k,
        };
        let candidates = self.rows.iter().filter(above_lower);

        let rows: Vec<Row> = match &request.upper {
            UpperBound::Limit(n) => candidates.take(*n).cloned().collect(),
            UpperBound::Before(k) => candidates.filter(|r| r.key < *k).cloned().collect(),
            UpperBound::Through(k) => candidates.filter(|r| r.key <= *k).cloned().collect(),
        };
        Ok(rows)
    }
}

#[async_trait]
impl TableSnapshot for MemoryTable {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    async fn close(&mut self) {
        debug!("Closing in-memory snapshot of {}", self.name);
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KeyValue;

    fn request(lower: LowerBound, upper: UpperBound) -> BatchRequest {
        BatchRequest {
            key_column: "id".into(),
            lower,
            upper,
        }
    }

    #[tokio::test]
    async fn test_metadata_reports_key_bounds() {
        let mut table = MemoryTable::with_text_rows("t", &[(5, "e"), (1, "a"), (3, "c")]);
        let meta = table.table_metadata(&TableRef::new("t")).await.unwrap();
        assert_eq!(meta.primary_key_column, "id");
        assert_eq!(meta.min_key_value, KeyValue::Int(1));
        assert_eq!(meta.max_key_value, KeyValue::Int(5));
        assert_eq!(meta.engine, "InnoDB");
    }

    #[tokio::test]
    async fn test_metadata_errors() {
        let t = TableRef::new("t");
        let err = MemoryTable::missing("t").table_metadata(&t).await.unwrap_err();
        assert!(matches!(err, ChecksumError::NotFound(_)));

        let err = MemoryTable::with_text_rows("t", &[(1, "a")])
            .without_primary_key()
            .table_metadata(&t)
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::NoPrimaryKey(_)));

        let err = MemoryTable::with_text_rows("t", &[])
            .table_metadata(&t)
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::EmptyTable(_)));

        let err = MemoryTable::with_text_rows("t", &[(1, "a")])
            .table_metadata(&TableRef::new("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_bounds() {
        let mut table = MemoryTable::with_text_rows("t", &[(1, "a"), (2, "b"), (4, "d"), (7, "g")]);
        let t = TableRef::new("t");
        let keys = |rows: Vec<Row>| rows.into_iter().map(|r| r.key).collect::<Vec<_>>();

        let rows = table
            .fetch_batch(&t, &request(LowerBound::Start, UpperBound::Limit(2)))
            .await
            .unwrap();
        assert_eq!(keys(rows), [KeyValue::Int(1), KeyValue::Int(2)]);

        let rows = table
            .fetch_batch(
                &t,
                &request(LowerBound::After(KeyValue::Int(2)), UpperBound::Limit(5)),
            )
            .await
            .unwrap();
        assert_eq!(keys(rows), [KeyValue::Int(4), KeyValue::Int(7)]);

        let rows = table
            .fetch_batch(
                &t,
                &request(
                    LowerBound::From(KeyValue::Int(2)),
                    UpperBound::Before(KeyValue::Int(7)),
                ),
            )
            .await
            .unwrap();
        assert_eq!(keys(rows), [KeyValue::Int(2), KeyValue::Int(4)]);

        let rows = table
            .fetch_batch(
                &t,
                &request(
                    LowerBound::From(KeyValue::Int(4)),
                    UpperBound::Through(KeyValue::Int(7)),
                ),
            )
            .await
            .unwrap();
        assert_eq!(keys(rows), [KeyValue::Int(4), KeyValue::Int(7)]);

        assert_eq!(table.fetch_counter().load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mut table = MemoryTable::with_text_rows("t", &[(1, "a")]).fail_at_batch(0);
        let err = table
            .fetch_batch(
                &TableRef::new("t"),
                &request(LowerBound::Start, UpperBound::Limit(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::Query { .. }));
    }

    #[tokio::test]
    async fn test_update_and_delete_rows() {
        let mut table = MemoryTable::with_text_rows("t", &[(1, "a"), (3, "c")]);
        table.update_row(Row::from_text(2, &[Some("2"), Some("b")]));
        table.update_row(Row::from_text(3, &[Some("3"), Some("z")]));
        table.delete_row(&KeyValue::Int(1));

        let rows = table
            .fetch_batch(
                &TableRef::new("t"),
                &request(LowerBound::Start, UpperBound::Limit(10)),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], Row::from_text(3, &[Some("3"), Some("z")]));

        table.close().await;
        assert!(table.is_closed());
    }
}

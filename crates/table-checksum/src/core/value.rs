//! Row and batch representations handed from providers to the scanner.
//!
//! Column values stay as the raw bytes the provider produced. The digest is
//! computed over those bytes, so both sides must use providers that render the
//! same value the same way.

use super::schema::KeyValue;

/// Raw column value. `None` is SQL NULL.
pub type RawValue = Option<Vec<u8>>;

/// One row of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Primary key value of the row, decoded by the provider.
    pub key: KeyValue,
    /// Every column of the row, in table column order (the key column included).
    pub columns: Vec<RawValue>,
}

impl Row {
    /// Create a row from its key and column values.
    pub fn new(key: impl Into<KeyValue>, columns: Vec<RawValue>) -> Self {
        Self {
            key: key.into(),
            columns,
        }
    }

    /// Build a row from text columns; convenient for fixtures.
    pub fn from_text(key: impl Into<KeyValue>, columns: &[Option<&str>]) -> Self {
        Self::new(
            key,
            columns
                .iter()
                .map(|c| c.map(|s| s.as_bytes().to_vec()))
                .collect(),
        )
    }
}

/// A batch of rows covering one cursor step.
///
/// Exists only while its digest is computed.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Label of the batch: the last key consumed (row batching) or the range start
    /// (range batching).
    pub cursor: KeyValue,
    /// Rows in primary key order.
    pub rows: Vec<Row>,
}

impl Batch {
    /// Create a batch.
    pub fn new(cursor: KeyValue, rows: Vec<Row>) -> Self {
        Self { cursor, rows }
    }
}

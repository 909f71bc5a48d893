//! Table identifiers, primary key values and table metadata.
//!
//! These types are database-agnostic: providers fill them in from whatever
//! catalog their engine exposes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a primary key value of various types.
///
/// Ordering follows the key's natural order within one variant: numeric for
/// integers, byte order for text and binary keys. Across variants integers
/// sort before text and text before bytes, which only matters if two providers
/// disagree on the key type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    /// Integer primary key (covers int, bigint, smallint, tinyint).
    Int(i64),
    /// String primary key (varchar, char, etc.).
    Text(String),
    /// Binary string primary key (binary, varbinary), e.g. a packed UUID.
    Bytes(Vec<u8>),
}

impl KeyValue {
    /// Integer value of the key, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyValue::Int(v) => Some(*v),
            KeyValue::Text(_) | KeyValue::Bytes(_) => None,
        }
    }

    /// Name of the key type, for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            KeyValue::Int(_) => "integer",
            KeyValue::Text(_) => "text",
            KeyValue::Bytes(_) => "bytes",
        }
    }

    /// Convert to a SQL literal string for use in queries.
    ///
    /// # Security Note
    ///
    /// Single quotes and backslashes are escaped, which is enough for key values
    /// read back from the same database. Keys never come from user input.
    /// Binary keys are written as hex literals and need no escaping.
    pub fn to_sql_literal(&self) -> String {
        match self {
            KeyValue::Int(v) => v.to_string(),
            KeyValue::Text(v) => format!("'{}'", v.replace('\\', "\\\\").replace('\'', "''")),
            KeyValue::Bytes(v) => format!("X'{}'", hex::encode(v)),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::Text(v) => f.write_str(v),
            KeyValue::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(v as i64)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

impl From<Vec<u8>> for KeyValue {
    fn from(v: Vec<u8>) -> Self {
        KeyValue::Bytes(v)
    }
}

/// A table identifier as given on the command line: `table` or `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema (database) name; `None` means the connection's default.
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Create a table reference without a schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Create a schema-qualified table reference.
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Parse `table` or `schema.table`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Self::qualified(schema, name)
            }
            _ => Self::new(raw),
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// The fixed metadata fields emitted ahead of the data batches, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Engine,
    Version,
    RowFormat,
    PrimaryKeyColumn,
    MaxKeyValue,
}

impl MetadataField {
    /// All fields in the order a scanner emits them.
    pub const ALL: [MetadataField; 5] = [
        MetadataField::Engine,
        MetadataField::Version,
        MetadataField::RowFormat,
        MetadataField::PrimaryKeyColumn,
        MetadataField::MaxKeyValue,
    ];

    /// Label used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Engine => "engine",
            MetadataField::Version => "version",
            MetadataField::RowFormat => "row_format",
            MetadataField::PrimaryKeyColumn => "primary_key_column",
            MetadataField::MaxKeyValue => "max_key_value",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table metadata captured once per side at the start of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Storage engine (e.g. "InnoDB").
    pub engine: String,
    /// Table format version as reported by the catalog.
    pub version: String,
    /// Row format (e.g. "Dynamic").
    pub row_format: String,
    /// Primary key column used to order and bound batches.
    pub primary_key_column: String,
    /// Smallest key value; seeds range batching, never emitted.
    pub min_key_value: KeyValue,
    /// Largest key value; the scan ends on the batch that reaches it.
    pub max_key_value: KeyValue,
}

impl TableMetadata {
    /// Value of one of the emitted metadata fields.
    pub fn field(&self, field: MetadataField) -> String {
        match field {
            MetadataField::Engine => self.engine.clone(),
            MetadataField::Version => self.version.clone(),
            MetadataField::RowFormat => self.row_format.clone(),
            MetadataField::PrimaryKeyColumn => self.primary_key_column.clone(),
            MetadataField::MaxKeyValue => self.max_key_value.to_string(),
        }
    }
}

//! Error types for the checksum library.

use thiserror::Error;

/// Exit code for configuration errors (bad YAML, missing fields, invalid values).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for setup errors (connection, missing table, no primary key, empty table).
pub const EXIT_SETUP_ERROR: u8 = 2;
/// Exit code for failures while scanning batches.
pub const EXIT_SCAN_ERROR: u8 = 3;
/// Exit code when the two tables diverge.
pub const EXIT_DIVERGENT: u8 = 4;
/// Exit code for file I/O errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for checksum operations.
///
/// A divergence between the two tables is not an error; it is reported through
/// [`crate::verify::Verdict`].
#[derive(Error, Debug)]
pub enum ChecksumError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not open a connection or a snapshot transaction
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Table does not exist on one side
    #[error("Table {0} not found")]
    NotFound(String),

    /// No primary key could be detected for the table
    #[error("Table {0} has no primary key - batch scanning requires one")]
    NoPrimaryKey(String),

    /// Table has no rows, so no maximum key value exists
    #[error("Table {0} is empty - no max key value obtainable")]
    EmptyTable(String),

    /// Primary key type cannot be used with the chosen batching strategy
    #[error("Table {table}: primary key {column} is not usable for {reason}")]
    UnsupportedKey {
        table: String,
        column: String,
        reason: String,
    },

    /// A batch or metadata query failed
    #[error("Query failed on {table}: {message}")]
    Query { table: String, message: String },

    /// A row could not be decoded, or the batch sequence broke its own invariants
    #[error("Scan failed on {table} at {cursor}: {message}")]
    Scan {
        table: String,
        cursor: String,
        message: String,
    },

    /// A scanner task panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChecksumError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        ChecksumError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Query error
    pub fn query(table: impl Into<String>, message: impl ToString) -> Self {
        ChecksumError::Query {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Scan error
    pub fn scan(
        table: impl Into<String>,
        cursor: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        ChecksumError::Scan {
            table: table.into(),
            cursor: cursor.to_string(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ChecksumError::Config(_) | ChecksumError::Yaml(_) | ChecksumError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            ChecksumError::Connection { .. }
            | ChecksumError::NotFound(_)
            | ChecksumError::NoPrimaryKey(_)
            | ChecksumError::EmptyTable(_)
            | ChecksumError::UnsupportedKey { .. } => EXIT_SETUP_ERROR,
            ChecksumError::Query { .. } | ChecksumError::Scan { .. } | ChecksumError::Internal(_) => {
                EXIT_SCAN_ERROR
            }
            ChecksumError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for checksum operations.
pub type Result<T> = std::result::Result<T, ChecksumError>;

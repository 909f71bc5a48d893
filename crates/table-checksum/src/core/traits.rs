//! Collaborator contracts between the checksum core and the outside world.
//!
//! - [`MetadataProvider`]: Resolves table metadata, including the primary key
//! - [`RowBatchProvider`]: Fetches one ordered batch of rows
//! - [`TableSnapshot`]: Both of the above over one read-consistent snapshot
//! - [`ResultSink`]: Receives the final report
//!
//! The core never names a SQL dialect or a primary key column itself; both come
//! from the providers.

use async_trait::async_trait;

use crate::error::Result;
use crate::verify::VerifyReport;

use super::schema::{KeyValue, TableMetadata, TableRef};
use super::value::Row;

/// Where a batch starts relative to the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerBound {
    /// From the smallest key in the table.
    Start,
    /// Keys strictly greater than the given value.
    After(KeyValue),
    /// Keys greater than or equal to the given value.
    From(KeyValue),
}

/// Where a batch stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpperBound {
    /// At most this many rows.
    Limit(usize),
    /// Keys strictly less than the given value.
    Before(KeyValue),
    /// Keys less than or equal to the given value.
    Through(KeyValue),
}

/// Parameters for one batch fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Primary key column that orders and bounds the batch.
    pub key_column: String,
    /// Lower bound on the key.
    pub lower: LowerBound,
    /// Upper bound on the batch.
    pub upper: UpperBound,
}

/// Resolve metadata for a table.
#[async_trait]
pub trait MetadataProvider: Send {
    /// Load table metadata.
    ///
    /// Fails with `NotFound` if the table is absent, `NoPrimaryKey` if no key can
    /// be detected, and `EmptyTable` if there is no max key value.
    async fn table_metadata(&mut self, table: &TableRef) -> Result<TableMetadata>;
}

/// Fetch ordered batches of rows.
#[async_trait]
pub trait RowBatchProvider: Send {
    /// Fetch the rows of one batch in ascending key order.
    ///
    /// Fails with `Query` or `Scan` errors.
    async fn fetch_batch(&mut self, table: &TableRef, request: &BatchRequest) -> Result<Vec<Row>>;
}

/// One side of the comparison: metadata and rows read from a single
/// read-consistent snapshot.
#[async_trait]
pub trait TableSnapshot: MetadataProvider + RowBatchProvider {
    /// Short description used in logs (e.g. "mysql://host:3306/db").
    fn describe(&self) -> String;

    /// End the snapshot and release the connection.
    ///
    /// Called once when the scanner stops, whatever the reason.
    async fn close(&mut self);
}

/// Receives the final verdict.
pub trait ResultSink {
    /// Deliver the report. Its `exit_code()` is the status the driver should exit with.
    fn deliver(&mut self, report: &VerifyReport) -> Result<()>;
}

/// Sink that keeps every delivered report; used by embedders and tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Reports in delivery order.
    pub reports: Vec<VerifyReport>,
}

impl ResultSink for CollectingSink {
    fn deliver(&mut self, report: &VerifyReport) -> Result<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}

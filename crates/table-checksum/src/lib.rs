//! # table-checksum
//!
//! Verify that two copies of a table hold identical data without moving row
//! contents between them.
//!
//! Each side is scanned in primary key order, in batches that both sides cut
//! identically. Every batch is reduced to a SHA-256 digest and the two digest
//! streams are compared in lockstep; the first divergence stops the run:
//!
//! - **Status mismatch**: table metadata differs (engine, version, row format,
//!   key column, max key)
//! - **Sequence mismatch**: batch boundaries differ
//! - **Data mismatch**: same batch, different digest
//! - **Sequence length mismatch**: one table runs out of batches first
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_checksum::{Config, MysqlSnapshot, VerifyPipeline};
//!
//! #[tokio::main]
//! async fn main() -> table_checksum::Result<()> {
//!     let config = Config::load("checksum.yaml")?;
//!     let source = MysqlSnapshot::open(&config.source).await?;
//!     let target = MysqlSnapshot::open(config.target_connection()).await?;
//!     let report = VerifyPipeline::from_config(source, target, &config).run().await?;
//!     println!("{:?}", report.verdict);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod verify;

// Re-exports for convenient access
pub use crate::config::{BatchStrategy, Config, ConnectionConfig, DigestFormat, VerifyConfig};
pub use crate::core::{
    CollectingSink, KeyValue, MetadataProvider, ResultSink, Row, RowBatchProvider, TableMetadata,
    TableRef, TableSnapshot,
};
pub use drivers::{MemoryTable, MysqlSnapshot};
pub use error::{ChecksumError, Result};
pub use verify::{
    Divergence, DivergenceKind, ScanPlan, Verdict, VerifyPipeline, VerifyReport,
};

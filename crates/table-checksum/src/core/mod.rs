//! Core abstractions shared by the scanner, the comparator and the drivers.
//!
//! - [`schema`]: Table identifiers, key values and table metadata
//! - [`value`]: Raw rows and batches
//! - [`traits`]: Collaborator contracts implemented by drivers
//!
//! Driver modules (`drivers/mysql`, `drivers/memory`) implement the traits; the
//! scanner and comparator only see the traits.

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{KeyValue, MetadataField, TableMetadata, TableRef};
pub use traits::{
    BatchRequest, CollectingSink, LowerBound, MetadataProvider, ResultSink, RowBatchProvider,
    TableSnapshot, UpperBound,
};
pub use value::{Batch, RawValue, Row};

//! Collaborator implementations.
//!
//! - [`mysql`]: MySQL/MariaDB snapshots over SQLx
//! - [`memory`]: Tables held in memory
//!
//! Both implement [`TableSnapshot`](crate::core::TableSnapshot); the pipeline
//! is generic over it, so each side may use a different driver.

pub mod memory;
pub mod mysql;

pub use memory::MemoryTable;
pub use mysql::{MysqlDialect, MysqlSnapshot};

//! Batch digest computation.
//!
//! A batch is reduced to a SHA-256 over its column bytes, column order then row
//! order. Two input formats exist:
//!
//! - **Framed**: every column is written as a tag byte (`0x00` NULL, `0x01`
//!   value), the value length as a big-endian `u64`, then the bytes; each row
//!   ends with `0x1e`. Column and row boundaries cannot be confused.
//! - **Plain**: the raw bytes of every non-NULL column, concatenated. Adjacent
//!   columns are ambiguous (`"ab"+"c"` hashes like `"a"+"bc"`) and NULL hashes
//!   like an empty string. Kept for digests produced by the older scheme.

use sha2::{Digest as _, Sha256};

use super::types::Digest;
use crate::config::DigestFormat;
use crate::core::Row;

const TAG_NULL: u8 = 0x00;
const TAG_VALUE: u8 = 0x01;
const ROW_END: u8 = 0x1e;

/// Digest a batch of rows.
pub fn digest_rows(rows: &[Row], format: DigestFormat) -> Digest {
    let mut hasher = Sha256::new();

    match format {
        DigestFormat::Framed => {
            for row in rows {
                for column in &row.columns {
                    match column {
                        None => hasher.update([TAG_NULL]),
                        Some(bytes) => {
                            hasher.update([TAG_VALUE]);
                            hasher.update((bytes.len() as u64).to_be_bytes());
                            hasher.update(bytes);
                        }
                    }
                }
                hasher.update([ROW_END]);
            }
        }
        DigestFormat::Plain => {
            for row in rows {
                for bytes in row.columns.iter().flatten() {
                    hasher.update(bytes);
                }
            }
        }
    }

    Digest(hasher.finalize().into())
}

//! Type definitions for batch-digest verification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{BatchStrategy, DigestFormat, VerifyConfig};
use crate::core::{KeyValue, MetadataField};
use crate::error::{EXIT_DIVERGENT, Result};

/// Width of a batch digest in bytes (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Fixed-width digest of one batch.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Label of a result: a metadata field name or a data cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Meta(MetadataField),
    Cursor(KeyValue),
}

impl Label {
    /// What the label names: `metadata`, or the type of the cursor key.
    pub fn kind(&self) -> &'static str {
        match self {
            Label::Meta(_) => "metadata",
            Label::Cursor(key) => key.kind(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Meta(field) => write!(f, "{}", field),
            Label::Cursor(key) => write!(f, "{}", key),
        }
    }
}

/// Payload of a result: a metadata value or a batch digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Meta(String),
    Digest(Digest),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Meta(value) => f.write_str(value),
            Payload::Digest(digest) => write!(f, "{}", digest),
        }
    }
}

/// The unit a scanner sends to the comparator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub label: Label,
    pub payload: Payload,
}

impl BatchResult {
    /// Result for one metadata field.
    pub fn metadata(field: MetadataField, value: impl Into<String>) -> Self {
        Self {
            label: Label::Meta(field),
            payload: Payload::Meta(value.into()),
        }
    }

    /// Result for one data batch.
    pub fn data(cursor: KeyValue, digest: Digest) -> Self {
        Self {
            label: Label::Cursor(cursor),
            payload: Payload::Digest(digest),
        }
    }

    /// Whether this result belongs to the metadata prefix.
    pub fn is_metadata(&self) -> bool {
        matches!(self.label, Label::Meta(_))
    }
}

/// Batching parameters shared by both scanners.
///
/// Both sides must receive the same plan, otherwise batch labels cannot line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPlan {
    /// Rows per batch (row batching) or key range width (range batching).
    pub step: u64,
    /// Batching strategy.
    pub batching: BatchStrategy,
    /// Digest input format.
    pub digest_format: DigestFormat,
}

impl ScanPlan {
    /// Row batching with the default digest format.
    pub fn rows(step: u64) -> Self {
        Self {
            step,
            batching: BatchStrategy::Rows,
            digest_format: DigestFormat::default(),
        }
    }

    /// Range batching with the default digest format.
    pub fn range(step: u64) -> Self {
        Self {
            step,
            batching: BatchStrategy::Range,
            digest_format: DigestFormat::default(),
        }
    }

    /// Use a specific digest format.
    pub fn with_digest_format(mut self, format: DigestFormat) -> Self {
        self.digest_format = format;
        self
    }
}

impl From<&VerifyConfig> for ScanPlan {
    fn from(config: &VerifyConfig) -> Self {
        Self {
            step: config.step,
            batching: config.batching,
            digest_format: config.digest_format,
        }
    }
}

/// Which table a scanner reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// What one scanner did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Table scanned (fully qualified).
    pub table: String,
    /// Data batches emitted.
    pub batches: u64,
    /// Rows digested.
    pub rows: u64,
    /// Whether the comparator stopped listening before the scan finished.
    pub abandoned: bool,
}

/// Kind of divergence found by the comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// One stream ended while the other continued.
    SequenceLength,
    /// Labels differ: batch boundaries disagree.
    Sequence,
    /// Same data cursor, different digest.
    Data,
    /// Same metadata field, different value.
    Status,
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceKind::SequenceLength => write!(f, "sequence length mismatch"),
            DivergenceKind::Sequence => write!(f, "sequence mismatch"),
            DivergenceKind::Data => write!(f, "data mismatch"),
            DivergenceKind::Status => write!(f, "status mismatch"),
        }
    }
}

/// The first point where the two tables disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    /// What disagreed.
    pub kind: DivergenceKind,
    /// Dividing label: a cursor or a metadata field name. For sequence
    /// mismatches, the source label.
    pub label: String,
    /// Source side: payload, or label for sequence mismatches. `None` if the
    /// source stream had ended.
    pub source: Option<String>,
    /// Target side, same convention as `source`.
    pub target: Option<String>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self.source.as_deref().unwrap_or("<end>");
        let target = self.target.as_deref().unwrap_or("<end>");
        match self.kind {
            DivergenceKind::Sequence | DivergenceKind::SequenceLength => {
                write!(f, "{}: source({}) != target({})", self.kind, source, target)
            }
            DivergenceKind::Data | DivergenceKind::Status => write!(
                f,
                "{} at {}: source({}) != target({})",
                self.kind, self.label, source, target
            ),
        }
    }
}

/// Outcome of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Consistent,
    Divergent(Divergence),
}

impl Verdict {
    /// Whether the tables were found identical.
    pub fn is_consistent(&self) -> bool {
        matches!(self, Verdict::Consistent)
    }

    /// The divergence, if any.
    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            Verdict::Consistent => None,
            Verdict::Divergent(d) => Some(d),
        }
    }
}

/// Final report handed to a [`crate::core::ResultSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Source table (fully qualified).
    pub source_table: String,
    /// Target table (fully qualified).
    pub target_table: String,
    /// Batching parameters used on both sides.
    pub plan: ScanPlan,
    /// Comparison outcome.
    pub verdict: Verdict,
    /// Metadata results compared.
    pub metadata_compared: u64,
    /// Data batches compared.
    pub batches_compared: u64,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl VerifyReport {
    /// Process exit code for this report.
    pub fn exit_code(&self) -> u8 {
        if self.verdict.is_consistent() {
            0
        } else {
            EXIT_DIVERGENT
        }
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

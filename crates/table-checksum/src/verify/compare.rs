//! Lockstep comparator.
//!
//! Takes one item from each stream per step and stops at the first
//! disagreement. Dropping the receivers on return stops both scanners.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::types::{BatchResult, Divergence, DivergenceKind, Label, Verdict};
use crate::core::MetadataField;
use crate::error::Result;

/// Outcome of one comparison run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub verdict: Verdict,
    /// Metadata pairs examined, the divergent one included.
    pub metadata_compared: u64,
    /// Data pairs examined, the divergent one included.
    pub batches_compared: u64,
}

/// Consumes the source and target streams in lockstep.
pub struct Comparator {
    source: mpsc::Receiver<Result<BatchResult>>,
    target: mpsc::Receiver<Result<BatchResult>>,
    prefix_gates: Vec<oneshot::Sender<()>>,
}

impl Comparator {
    pub fn new(
        source: mpsc::Receiver<Result<BatchResult>>,
        target: mpsc::Receiver<Result<BatchResult>>,
    ) -> Self {
        Self {
            source,
            target,
            prefix_gates: Vec::new(),
        }
    }

    /// Gate to open once the metadata prefix has matched on both sides.
    ///
    /// On divergence or error the gate is dropped unopened.
    pub fn with_prefix_gate(mut self, gate: oneshot::Sender<()>) -> Self {
        self.prefix_gates.push(gate);
        self
    }

    /// Run until both streams end together, a divergence, or an error.
    pub async fn run(mut self) -> Result<Comparison> {
        let mut metadata_compared = 0u64;
        let mut batches_compared = 0u64;

        let verdict = loop {
            let (source, target) = tokio::join!(self.source.recv(), self.target.recv());

            let (source, target) = match (source, target) {
                (Some(Err(e)), _) | (_, Some(Err(e))) => return Err(e),
                (None, None) => break Verdict::Consistent,
                (Some(Ok(s)), None) => break length_mismatch(Some(s), None),
                (None, Some(Ok(t))) => break length_mismatch(None, Some(t)),
                (Some(Ok(s)), Some(Ok(t))) => (s, t),
            };

            if source.is_metadata() {
                metadata_compared += 1;
            } else {
                batches_compared += 1;
            }

            if source.label != target.label {
                let (source_label, target_label) = describe_labels(&source.label, &target.label);
                break Verdict::Divergent(Divergence {
                    kind: DivergenceKind::Sequence,
                    label: source.label.to_string(),
                    source: Some(source_label),
                    target: Some(target_label),
                });
            }

            if source.payload != target.payload {
                let kind = if source.is_metadata() {
                    DivergenceKind::Status
                } else {
                    DivergenceKind::Data
                };
                break Verdict::Divergent(Divergence {
                    kind,
                    label: source.label.to_string(),
                    source: Some(source.payload.to_string()),
                    target: Some(target.payload.to_string()),
                });
            }

            debug!("Matched {} ({})", source.label, source.payload);

            if source.label == Label::Meta(MetadataField::MaxKeyValue) {
                for gate in self.prefix_gates.drain(..) {
                    let _ = gate.send(());
                }
            }
        };

        Ok(Comparison {
            verdict,
            metadata_compared,
            batches_compared,
        })
    }
}

/// Both labels as text. When their kinds differ the kind is appended, since an
/// integer key `1` and a text key `1` print alike.
fn describe_labels(source: &Label, target: &Label) -> (String, String) {
    if source.kind() == target.kind() {
        (source.to_string(), target.to_string())
    } else {
        (
            format!("{} ({})", source, source.kind()),
            format!("{} ({})", target, target.kind()),
        )
    }
}

fn length_mismatch(source: Option<BatchResult>, target: Option<BatchResult>) -> Verdict {
    let source = source.map(|r| r.label.to_string());
    let target = target.map(|r| r.label.to_string());
    Verdict::Divergent(Divergence {
        kind: DivergenceKind::SequenceLength,
        label: source.clone().or_else(|| target.clone()).unwrap_or_default(),
        source,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KeyValue;
    use crate::error::ChecksumError;
    use crate::verify::types::Digest;

    fn digest(byte: u8) -> Digest {
        Digest([byte; 32])
    }

    fn prefix(engine: &str, max: i64) -> Vec<BatchResult> {
        vec![
            BatchResult::metadata(MetadataField::Engine, engine),
            BatchResult::metadata(MetadataField::Version, "10"),
            BatchResult::metadata(MetadataField::RowFormat, "Dynamic"),
            BatchResult::metadata(MetadataField::PrimaryKeyColumn, "id"),
            BatchResult::metadata(MetadataField::MaxKeyValue, max.to_string()),
        ]
    }

    fn stream(items: Vec<Result<BatchResult>>) -> mpsc::Receiver<Result<BatchResult>> {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            tx.try_send(item).unwrap();
        }
        rx
    }

    fn ok(items: Vec<BatchResult>) -> Vec<Result<BatchResult>> {
        items.into_iter().map(Ok).collect()
    }

    fn with_batches(mut items: Vec<BatchResult>, batches: &[(i64, u8)]) -> Vec<BatchResult> {
        for (cursor, byte) in batches {
            items.push(BatchResult::data(KeyValue::Int(*cursor), digest(*byte)));
        }
        items
    }

    #[tokio::test]
    async fn test_identical_streams_are_consistent() {
        let items = with_batches(prefix("InnoDB", 3), &[(1, 1), (2, 2), (3, 3)]);
        let result = Comparator::new(stream(ok(items.clone())), stream(ok(items)))
            .run()
            .await
            .unwrap();
        assert_eq!(result.verdict, Verdict::Consistent);
        assert_eq!(result.metadata_compared, 5);
        assert_eq!(result.batches_compared, 3);
    }

    #[tokio::test]
    async fn test_status_mismatch_on_engine() {
        let result = Comparator::new(
            stream(ok(prefix("InnoDB", 3))),
            stream(ok(prefix("MyISAM", 3))),
        )
        .run()
        .await
        .unwrap();

        let divergence = result.verdict.divergence().unwrap();
        assert_eq!(divergence.kind, DivergenceKind::Status);
        assert_eq!(divergence.label, "engine");
        assert_eq!(divergence.source.as_deref(), Some("InnoDB"));
        assert_eq!(divergence.target.as_deref(), Some("MyISAM"));
        assert_eq!(result.batches_compared, 0);
    }

    #[tokio::test]
    async fn test_data_mismatch_reports_cursor() {
        let source = with_batches(prefix("InnoDB", 3), &[(1, 1), (2, 2), (3, 3)]);
        let target = with_batches(prefix("InnoDB", 3), &[(1, 1), (2, 9), (3, 3)]);
        let result = Comparator::new(stream(ok(source)), stream(ok(target)))
            .run()
            .await
            .unwrap();

        let divergence = result.verdict.divergence().unwrap();
        assert_eq!(divergence.kind, DivergenceKind::Data);
        assert_eq!(divergence.label, "2");
        assert_eq!(divergence.source, Some(digest(2).to_hex()));
        assert_eq!(divergence.target, Some(digest(9).to_hex()));
        assert_eq!(result.batches_compared, 2);
    }

    #[tokio::test]
    async fn test_sequence_mismatch_on_labels() {
        let source = with_batches(prefix("InnoDB", 4), &[(2, 1), (4, 2)]);
        let target = with_batches(prefix("InnoDB", 4), &[(1, 1), (2, 2)]);
        let result = Comparator::new(stream(ok(source)), stream(ok(target)))
            .run()
            .await
            .unwrap();

        let divergence = result.verdict.divergence().unwrap();
        assert_eq!(divergence.kind, DivergenceKind::Sequence);
        assert_eq!(divergence.source.as_deref(), Some("2"));
        assert_eq!(divergence.target.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_sequence_mismatch_names_differing_key_kinds() {
        let mut source = prefix("InnoDB", 1);
        source.push(BatchResult::data(KeyValue::Int(1), digest(1)));
        let mut target = prefix("InnoDB", 1);
        target.push(BatchResult::data(KeyValue::from("1"), digest(1)));

        let result = Comparator::new(stream(ok(source)), stream(ok(target)))
            .run()
            .await
            .unwrap();

        let divergence = result.verdict.divergence().unwrap();
        assert_eq!(divergence.kind, DivergenceKind::Sequence);
        assert_eq!(divergence.label, "1");
        assert_eq!(divergence.source.as_deref(), Some("1 (integer)"));
        assert_eq!(divergence.target.as_deref(), Some("1 (text)"));
        assert_eq!(
            divergence.to_string(),
            "sequence mismatch: source(1 (integer)) != target(1 (text))"
        );
    }

    #[tokio::test]
    async fn test_length_mismatch_when_target_ends_early() {
        let source = with_batches(prefix("InnoDB", 3), &[(1, 1), (2, 2), (3, 3)]);
        let target = with_batches(prefix("InnoDB", 3), &[(1, 1), (2, 2)]);
        let result = Comparator::new(stream(ok(source)), stream(ok(target)))
            .run()
            .await
            .unwrap();

        let divergence = result.verdict.divergence().unwrap();
        assert_eq!(divergence.kind, DivergenceKind::SequenceLength);
        assert_eq!(divergence.source.as_deref(), Some("3"));
        assert_eq!(divergence.target, None);
    }

    #[tokio::test]
    async fn test_length_mismatch_when_source_ends_early() {
        let source = prefix("InnoDB", 1);
        let target = with_batches(prefix("InnoDB", 1), &[(1, 1)]);
        let result = Comparator::new(stream(ok(source)), stream(ok(target)))
            .run()
            .await
            .unwrap();

        let divergence = result.verdict.divergence().unwrap();
        assert_eq!(divergence.kind, DivergenceKind::SequenceLength);
        assert_eq!(divergence.source, None);
        assert_eq!(divergence.target.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_stream_error_aborts_instead_of_diverging() {
        let source = ok(with_batches(prefix("InnoDB", 3), &[(1, 1), (2, 2), (3, 3)]));
        let mut target = ok(with_batches(prefix("InnoDB", 3), &[(1, 1)]));
        target.push(Err(ChecksumError::query("test.t", "connection lost")));

        let err = Comparator::new(stream(source), stream(target))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::Query { .. }));
    }

    #[tokio::test]
    async fn test_gates_open_after_prefix_matches() {
        let (gate_tx, gate_rx) = oneshot::channel();
        let items = prefix("InnoDB", 1);
        Comparator::new(stream(ok(items.clone())), stream(ok(items)))
            .with_prefix_gate(gate_tx)
            .run()
            .await
            .unwrap();
        assert!(gate_rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_gates_dropped_on_status_mismatch() {
        let (gate_tx, gate_rx) = oneshot::channel();
        Comparator::new(
            stream(ok(prefix("InnoDB", 1))),
            stream(ok(prefix("InnoDB", 2))),
        )
        .with_prefix_gate(gate_tx)
        .run()
        .await
        .unwrap();
        assert!(gate_rx.await.is_err());
    }
}

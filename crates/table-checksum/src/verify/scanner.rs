//! Batch scanner: one per side.
//!
//! A scanner reads one table through its [`TableSnapshot`], emits the metadata
//! prefix, then walks the primary key in batches and emits one digest per
//! batch. Results go down a bounded channel as `Result<BatchResult>`; an error
//! is sent down the same channel so the comparator stops on it instead of
//! mistaking a closed stream for a short table.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::digest::digest_rows;
use super::types::{BatchResult, ScanPlan, ScanSummary, Side};
use crate::config::BatchStrategy;
use crate::core::{
    Batch, BatchRequest, KeyValue, LowerBound, MetadataField, Row, TableMetadata, TableRef,
    TableSnapshot, UpperBound,
};
use crate::error::{ChecksumError, Result};

/// Walks the primary key of one table and decides batch bounds and labels.
///
/// Pure state machine: it never touches a database, so both sides compute the
/// same bounds from the same metadata and plan.
#[derive(Debug, Clone)]
pub struct BatchCursor {
    table: String,
    key_column: String,
    max_key: KeyValue,
    step: u64,
    state: CursorState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CursorState {
    Rows { last: Option<KeyValue> },
    /// `start` is the lower bound of the next grid cell.
    Range { start: i64 },
    Done,
}

/// Start of the grid cell holding `key`: the largest multiple of `step` not
/// above it. The partial cell at the bottom of the `i64` domain starts at
/// `i64::MIN`.
fn grid_start(key: i64, step: i64) -> i64 {
    key.checked_sub(key.rem_euclid(step)).unwrap_or(i64::MIN)
}

/// Exclusive end of the grid cell starting at `start`; `None` past `i64::MAX`.
fn grid_end(start: i64, step: i64) -> Option<i64> {
    start.checked_add(step - start.rem_euclid(step))
}

impl BatchCursor {
    /// Create a cursor positioned before the first batch.
    pub fn new(table: &TableRef, metadata: &TableMetadata, plan: &ScanPlan) -> Result<Self> {
        if plan.step == 0 || plan.step > i64::MAX as u64 {
            return Err(ChecksumError::Config(format!(
                "step must be between 1 and {}, got {}",
                i64::MAX,
                plan.step
            )));
        }

        let state = match plan.batching {
            BatchStrategy::Rows => CursorState::Rows { last: None },
            BatchStrategy::Range => {
                let (Some(min), Some(_)) = (
                    metadata.min_key_value.as_int(),
                    metadata.max_key_value.as_int(),
                ) else {
                    return Err(ChecksumError::UnsupportedKey {
                        table: table.full_name(),
                        column: metadata.primary_key_column.clone(),
                        reason: "range batching (integer keys only)".to_string(),
                    });
                };
                // Cells sit on multiples of step whatever the smallest key
                CursorState::Range {
                    start: grid_start(min, plan.step as i64),
                }
            }
        };

        Ok(Self {
            table: table.full_name(),
            key_column: metadata.primary_key_column.clone(),
            max_key: metadata.max_key_value.clone(),
            step: plan.step,
            state,
        })
    }

    /// Whether the batch reaching the max key has been consumed.
    pub fn is_done(&self) -> bool {
        self.state == CursorState::Done
    }

    /// Request for the next batch, or `None` once the scan is complete.
    pub fn next_request(&self) -> Option<BatchRequest> {
        let (lower, upper) = match &self.state {
            CursorState::Done => return None,
            CursorState::Rows { last } => (
                last.clone()
                    .map(LowerBound::After)
                    .unwrap_or(LowerBound::Start),
                UpperBound::Limit(self.step as usize),
            ),
            CursorState::Range { start } => {
                let upper = match grid_end(*start, self.step as i64) {
                    Some(end) => UpperBound::Before(KeyValue::Int(end)),
                    None => UpperBound::Through(self.max_key.clone()),
                };
                (LowerBound::From(KeyValue::Int(*start)), upper)
            }
        };

        Some(BatchRequest {
            key_column: self.key_column.clone(),
            lower,
            upper,
        })
    }

    /// Consume the rows returned for [`Self::next_request`] and label the batch.
    ///
    /// Checks that the provider honoured the bounds and key order.
    pub fn advance(&mut self, rows: Vec<Row>) -> Result<Batch> {
        check_ascending(&self.table, &rows)?;

        match self.state.clone() {
            CursorState::Done => Err(ChecksumError::scan(
                &self.table,
                &self.max_key,
                "batch fetched after the scan completed",
            )),
            CursorState::Rows { last } => {
                let position = last
                    .clone()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "start".to_string());

                let Some(label) = rows.last().map(|r| r.key.clone()) else {
                    return Err(ChecksumError::scan(
                        &self.table,
                        position,
                        format!("no rows left before reaching max key {}", self.max_key),
                    ));
                };
                if rows.len() as u64 > self.step {
                    return Err(ChecksumError::scan(
                        &self.table,
                        position,
                        format!("provider returned {} rows, limit was {}", rows.len(), self.step),
                    ));
                }
                if let Some(last) = &last {
                    if rows[0].key <= *last {
                        return Err(ChecksumError::scan(
                            &self.table,
                            position,
                            format!("key {} is not after the previous batch", rows[0].key),
                        ));
                    }
                }
                if label > self.max_key {
                    return Err(ChecksumError::scan(
                        &self.table,
                        position,
                        format!("key {} is beyond max key {}", label, self.max_key),
                    ));
                }

                self.state = if label == self.max_key {
                    CursorState::Done
                } else {
                    CursorState::Rows {
                        last: Some(label.clone()),
                    }
                };
                Ok(Batch::new(label, rows))
            }
            CursorState::Range { start } => {
                let end = grid_end(start, self.step as i64);
                let in_range = |key: &KeyValue| match key.as_int() {
                    Some(k) => k >= start && end.map_or(true, |end| k < end),
                    None => false,
                };
                if let Some(stray) = rows.iter().find(|r| !in_range(&r.key)) {
                    return Err(ChecksumError::scan(
                        &self.table,
                        start,
                        format!("key {} is outside the requested range", stray.key),
                    ));
                }

                let max = self.max_key.as_int().unwrap_or(i64::MAX);
                self.state = match end {
                    Some(end) if end <= max => CursorState::Range { start: end },
                    _ => CursorState::Done,
                };
                Ok(Batch::new(KeyValue::Int(start), rows))
            }
        }
    }
}

fn check_ascending(table: &str, rows: &[Row]) -> Result<()> {
    for pair in rows.windows(2) {
        if pair[1].key <= pair[0].key {
            return Err(ChecksumError::scan(
                table,
                &pair[0].key,
                format!("rows out of key order ({} after {})", pair[1].key, pair[0].key),
            ));
        }
    }
    Ok(())
}

/// Scans one side of the comparison.
pub struct BatchScanner<S> {
    side: Side,
    snapshot: S,
    table: TableRef,
    plan: ScanPlan,
    prefix_gate: Option<oneshot::Receiver<()>>,
}

impl<S: TableSnapshot> BatchScanner<S> {
    /// Create a scanner over an open snapshot.
    pub fn new(side: Side, snapshot: S, table: TableRef, plan: ScanPlan) -> Self {
        Self {
            side,
            snapshot,
            table,
            plan,
            prefix_gate: None,
        }
    }

    /// Wait for the gate after the metadata prefix before fetching any batch.
    ///
    /// The comparator opens the gate once both prefixes match; if it drops the
    /// sender instead, the scanner stops without reading data.
    pub fn with_prefix_gate(mut self, gate: oneshot::Receiver<()>) -> Self {
        self.prefix_gate = Some(gate);
        self
    }

    /// Run the scan to completion, then close the snapshot.
    ///
    /// Any error is also sent down `tx` before it is returned.
    pub async fn run(mut self, tx: mpsc::Sender<Result<BatchResult>>) -> Result<ScanSummary> {
        info!(
            "Scanning {} table {} via {} (batching={}, step={})",
            self.side,
            self.table,
            self.snapshot.describe(),
            self.plan.batching,
            self.plan.step
        );

        let result = self.scan(&tx).await;
        self.snapshot.close().await;

        match result {
            Ok(summary) => {
                if summary.abandoned {
                    debug!("{} scan of {} stopped early", self.side, summary.table);
                } else {
                    info!(
                        "{} scan of {} finished: {} batches, {} rows",
                        self.side, summary.table, summary.batches, summary.rows
                    );
                }
                Ok(summary)
            }
            Err(e) => {
                warn!("{} scan of {} failed: {}", self.side, self.table, e);
                let message = e.to_string();
                let _ = tx.send(Err(e)).await;
                Err(ChecksumError::Internal(format!(
                    "{} scanner failed: {}",
                    self.side, message
                )))
            }
        }
    }

    async fn scan(&mut self, tx: &mpsc::Sender<Result<BatchResult>>) -> Result<ScanSummary> {
        let mut summary = ScanSummary {
            table: self.table.full_name(),
            ..ScanSummary::default()
        };

        let metadata = self.snapshot.table_metadata(&self.table).await?;
        debug!(
            "{} metadata for {}: engine={}, key={}, max={}",
            self.side, self.table, metadata.engine, metadata.primary_key_column, metadata.max_key_value
        );

        for field in MetadataField::ALL {
            if tx
                .send(Ok(BatchResult::metadata(field, metadata.field(field))))
                .await
                .is_err()
            {
                summary.abandoned = true;
                return Ok(summary);
            }
        }

        let mut cursor = BatchCursor::new(&self.table, &metadata, &self.plan)?;

        if let Some(gate) = self.prefix_gate.take() {
            if gate.await.is_err() {
                summary.abandoned = true;
                return Ok(summary);
            }
        }

        while let Some(request) = cursor.next_request() {
            let rows = self.snapshot.fetch_batch(&self.table, &request).await?;
            let batch = cursor.advance(rows)?;
            let digest = digest_rows(&batch.rows, self.plan.digest_format);

            debug!(
                "{} batch at {}: {} rows, digest {}",
                self.side,
                batch.cursor,
                batch.rows.len(),
                digest
            );
            summary.batches += 1;
            summary.rows += batch.rows.len() as u64;

            if tx.send(Ok(BatchResult::data(batch.cursor, digest))).await.is_err() {
                summary.abandoned = true;
                return Ok(summary);
            }
        }

        Ok(summary)
    }
}

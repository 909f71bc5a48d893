//! Batch-digest verification of two copies of a table.
//!
//! Each side is scanned independently by a [`BatchScanner`] that walks the
//! primary key in batches and reduces every batch to a SHA-256 digest. The
//! [`Comparator`] drains both digest streams in lockstep:
//!
//! - **Prefix**: engine, version, row format, key column and max key are
//!   compared first; a difference is a status mismatch and no batch is read
//! - **Data**: labels must match (otherwise a sequence mismatch), then digests
//!   (otherwise a data mismatch)
//! - **End**: both streams must end together (otherwise a sequence length
//!   mismatch)
//!
//! The first divergence stops both scanners. Only digests cross the channels,
//! never row contents.

pub mod compare;
pub mod digest;
pub mod scanner;
pub mod types;

// Re-exports
pub use compare::{Comparator, Comparison};
pub use digest::digest_rows;
pub use scanner::{BatchCursor, BatchScanner};
pub use types::{
    BatchResult, Digest, Divergence, DivergenceKind, Label, Payload, ScanPlan, ScanSummary, Side,
    Verdict, VerifyReport, DIGEST_LEN,
};

use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::{ResultSink, TableRef, TableSnapshot};
use crate::error::{ChecksumError, Result};

/// Default capacity of each scanner's channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Two scanners and a comparator wired together for one table pair.
pub struct VerifyPipeline<S, T> {
    source: S,
    target: T,
    source_table: TableRef,
    target_table: TableRef,
    plan: ScanPlan,
    channel_capacity: usize,
}

impl<S, T> VerifyPipeline<S, T>
where
    S: TableSnapshot + 'static,
    T: TableSnapshot + 'static,
{
    /// Create a pipeline over two open snapshots.
    pub fn new(
        source: S,
        target: T,
        source_table: TableRef,
        target_table: TableRef,
        plan: ScanPlan,
    ) -> Self {
        Self {
            source,
            target,
            source_table,
            target_table,
            plan,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Create a pipeline with tables and plan taken from the configuration.
    pub fn from_config(source: S, target: T, config: &Config) -> Self {
        Self::new(
            source,
            target,
            TableRef::parse(&config.verify.source_table),
            TableRef::parse(config.target_table()),
            ScanPlan::from(&config.verify),
        )
        .with_channel_capacity(config.verify.channel_capacity)
    }

    /// Set the capacity of each scanner's channel.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Run both scans and the comparison.
    ///
    /// A divergence is returned as a report, not as an error.
    pub async fn run(self) -> Result<VerifyReport> {
        let start = Instant::now();
        let source_name = self.source_table.full_name();
        let target_name = self.target_table.full_name();
        let plan = self.plan;

        info!(
            "Verifying {} against {} (batching={}, step={}, digest={})",
            source_name, target_name, plan.batching, plan.step, plan.digest_format
        );

        let (source_tx, source_rx) = mpsc::channel(self.channel_capacity);
        let (target_tx, target_rx) = mpsc::channel(self.channel_capacity);
        let (source_gate_tx, source_gate_rx) = oneshot::channel();
        let (target_gate_tx, target_gate_rx) = oneshot::channel();

        let source_scanner = BatchScanner::new(Side::Source, self.source, self.source_table, plan)
            .with_prefix_gate(source_gate_rx);
        let target_scanner = BatchScanner::new(Side::Target, self.target, self.target_table, plan)
            .with_prefix_gate(target_gate_rx);

        let source_handle = tokio::spawn(source_scanner.run(source_tx));
        let target_handle = tokio::spawn(target_scanner.run(target_tx));

        let comparison = Comparator::new(source_rx, target_rx)
            .with_prefix_gate(source_gate_tx)
            .with_prefix_gate(target_gate_tx)
            .run()
            .await;

        // Receivers are gone at this point, so both scanners finish promptly.
        let source_done = join_scanner(Side::Source, source_handle).await;
        let target_done = join_scanner(Side::Target, target_handle).await;

        let comparison = comparison?;
        source_done?;
        target_done?;

        let report = VerifyReport {
            source_table: source_name,
            target_table: target_name,
            plan,
            verdict: comparison.verdict,
            metadata_compared: comparison.metadata_compared,
            batches_compared: comparison.batches_compared,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        match &report.verdict {
            Verdict::Consistent => info!(
                "{} and {} are consistent ({} batches in {}ms)",
                report.source_table, report.target_table, report.batches_compared, report.duration_ms
            ),
            Verdict::Divergent(divergence) => warn!(
                "{} and {} diverge: {}",
                report.source_table, report.target_table, divergence
            ),
        }

        Ok(report)
    }

    /// Run and hand the report to a sink.
    pub async fn run_with_sink(self, sink: &mut dyn ResultSink) -> Result<VerifyReport> {
        let report = self.run().await?;
        sink.deliver(&report)?;
        Ok(report)
    }
}

/// Wait for a scanner task.
///
/// A panicked or aborted scanner is an error: its stream closed early and the
/// comparator may have read that as a short table. Errors the scanner returned
/// itself were already sent down its stream, so they are only logged here.
async fn join_scanner(side: Side, handle: JoinHandle<Result<ScanSummary>>) -> Result<()> {
    match handle.await {
        Ok(Ok(summary)) => {
            debug!(
                "{} scanner done: {} batches, {} rows, abandoned={}",
                side, summary.batches, summary.rows, summary.abandoned
            );
            Ok(())
        }
        Ok(Err(e)) => {
            debug!("{} scanner ended with error: {}", side, e);
            Ok(())
        }
        Err(e) => Err(ChecksumError::Internal(format!(
            "{} scanner task failed: {}",
            side, e
        ))),
    }
}

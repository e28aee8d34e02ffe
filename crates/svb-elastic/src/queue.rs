//! Size-bounded write buffer in front of the bulk API.
//!
//! All writers funnel through one queue. The queue owns its pending list
//! behind a tokio mutex and holds the lock across the bulk send, so requests
//! leave in submission order and no request ever carries more than
//! `bulk_size` operations.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::ElasticClient;
use crate::error::ElasticError;
use crate::operation::{BulkItemFailure, BulkOperation, DocType};

/// Outcome of a completed flush: everything buffered has been sent, and
/// `failures` is a snapshot of every item rejection seen since the queue was
/// created. The accumulator survives the flush, so a later flush reports the
/// earlier rejections again.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub failures: Vec<BulkItemFailure>,
}

impl FlushReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when any failure is an update against a missing document. A run
    /// that sees these was probably started with a watermark older than the
    /// index contents.
    #[must_use]
    pub fn has_missing_update_targets(&self) -> bool {
        self.failures
            .iter()
            .any(BulkItemFailure::is_missing_update_target)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: Vec<BulkOperation>,
    failures: Vec<BulkItemFailure>,
}

#[derive(Debug)]
pub struct BulkWriteQueue {
    client: Arc<ElasticClient>,
    bulk_size: usize,
    state: Mutex<QueueState>,
}

impl BulkWriteQueue {
    /// # Panics
    ///
    /// Panics when `bulk_size` is zero; config validation rejects that
    /// before a queue is built.
    #[must_use]
    pub fn new(client: Arc<ElasticClient>, bulk_size: usize) -> Self {
        assert!(bulk_size > 0, "bulk_size must be positive");
        Self {
            client,
            bulk_size,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Buffers a full-document write, flushing full batches when the buffer
    /// reaches the size bound.
    ///
    /// # Errors
    ///
    /// Returns an error when a triggered flush fails at the transport level.
    /// Item-level rejections accumulate in the queue instead.
    pub async fn push_index(
        &self,
        doc_type: DocType,
        document: serde_json::Value,
    ) -> Result<(), ElasticError> {
        let op = BulkOperation::index(doc_type, document)?;
        self.push(op).await
    }

    /// Buffers a partial-document patch, flushing full batches when the
    /// buffer reaches the size bound.
    ///
    /// # Errors
    ///
    /// Returns an error when a triggered flush fails at the transport level.
    pub async fn push_update(
        &self,
        doc_type: DocType,
        patch: serde_json::Value,
    ) -> Result<(), ElasticError> {
        let op = BulkOperation::update(doc_type, patch)?;
        self.push(op).await
    }

    async fn push(&self, op: BulkOperation) -> Result<(), ElasticError> {
        let mut state = self.state.lock().await;
        state.pending.push(op);

        // Drain in full batches. The loop (rather than a single drain)
        // keeps the bound even if a caller ever batches pushes under one
        // lock acquisition.
        while state.pending.len() >= self.bulk_size {
            let batch: Vec<BulkOperation> = state.pending.drain(..self.bulk_size).collect();
            let failures = self.send(&batch).await?;
            state.failures.extend(failures);
        }
        Ok(())
    }

    /// Sends whatever remains in the buffer and returns a snapshot of every
    /// item failure accumulated since the queue was created. The buffer is
    /// empty when this returns Ok; the failure accumulator is not reset, so
    /// the report at the end of a run covers the whole run no matter how
    /// many flushes happened along the way.
    ///
    /// # Errors
    ///
    /// Returns an error when the final bulk request fails at the transport
    /// level.
    pub async fn flush(&self) -> Result<FlushReport, ElasticError> {
        let mut state = self.state.lock().await;

        if !state.pending.is_empty() {
            let batch: Vec<BulkOperation> = state.pending.drain(..).collect();
            let failures = self.send(&batch).await?;
            state.failures.extend(failures);
        }

        Ok(FlushReport {
            failures: state.failures.clone(),
        })
    }

    async fn send(&self, batch: &[BulkOperation]) -> Result<Vec<BulkItemFailure>, ElasticError> {
        tracing::debug!(operations = batch.len(), "sending bulk batch");
        let failures = self.client.bulk(batch).await?;
        if !failures.is_empty() {
            tracing::warn!(rejected = failures.len(), "bulk batch had item failures");
        }
        Ok(failures)
    }
}

//! Per-run collaborators and cancellation, passed explicitly to every phase.

use std::future::Future;
use std::sync::Arc;

use bridge_traits::{SourceDirectory, TargetStore};
use core_async::sync::CancellationToken;

use crate::filter::FilterPolicy;
use crate::{Result, SyncError};

/// Everything a phase needs to talk to the two directories.
///
/// Built once per run. Cancelling the token makes the next collaborator call
/// fail with [`SyncError::Cancelled`]; calls already in flight complete.
#[derive(Clone)]
pub struct SyncContext {
    source: Arc<dyn SourceDirectory>,
    target: Arc<dyn TargetStore>,
    filter: FilterPolicy,
    cancellation: CancellationToken,
    probe_concurrency: usize,
}

impl SyncContext {
    pub fn new(
        source: Arc<dyn SourceDirectory>,
        target: Arc<dyn TargetStore>,
        filter: FilterPolicy,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            filter,
            cancellation,
            probe_concurrency: 1,
        }
    }

    /// Number of target membership probes allowed in flight; at least 1.
    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self
    }

    pub fn source(&self) -> &dyn SourceDirectory {
        self.source.as_ref()
    }

    pub fn target(&self) -> &dyn TargetStore {
        self.target.as_ref()
    }

    pub fn filter(&self) -> &FilterPolicy {
        &self.filter
    }

    pub fn probe_concurrency(&self) -> usize {
        self.probe_concurrency
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    /// Run a collaborator call after a cancellation check, leaving its
    /// outcome for the caller to classify.
    pub async fn guarded<T, F>(&self, call: F) -> Result<bridge_traits::Result<T>>
    where
        F: Future<Output = bridge_traits::Result<T>>,
    {
        self.ensure_active()?;
        Ok(call.await)
    }

    /// Run a collaborator call where every failure is fatal.
    pub async fn call<T, F>(&self, operation: &'static str, key: &str, call: F) -> Result<T>
    where
        F: Future<Output = bridge_traits::Result<T>>,
    {
        self.guarded(call)
            .await?
            .map_err(|e| SyncError::transport(operation, key, e))
    }
}

use thiserror::Error;

/// Errors surfaced by the apply path.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Consensus-critical divergence (fork, commit mismatch, app hash
    /// mismatch). The node must stop rather than mask it.
    #[error("invariant violation at height {height}: {reason}")]
    Fatal { height: u64, reason: String },
    /// Retried on the next attempt.
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}

impl SyncError {
    pub fn fatal(height: u64, reason: impl Into<String>) -> Self {
        SyncError::Fatal {
            height,
            reason: reason.into(),
        }
    }
}

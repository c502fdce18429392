//! Error taxonomy for the workflow engine.
//!
//! Most variants are sentinel conditions rather than failures: `Eof` marks
//! terminal completion, `NoChange` tells the caller to retry with different
//! input, and `IncompatibleInput` never escapes the edge-selection loop.
//! Wiring bugs in concrete flows (duplicate kind registration, an intent
//! deriving zero edges without signalling end of flow) are deliberately
//! fatal and panic instead of surfacing here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The edge under trial cannot consume this input. Internal to the
    /// accept loop; the next candidate edge is tried instead.
    #[error("incompatible input")]
    IncompatibleInput,

    /// The input produced no progress at all. Retryable with different
    /// input; the persisted instance is untouched.
    #[error("workflow did not change")]
    NoChange,

    /// The whole tree reached end of flow. The workflow is terminal and
    /// must be finalized; no further input is accepted for it.
    #[error("end of flow")]
    Eof,

    /// No live workflow for the given id. Expired, deleted, and
    /// never-existent records are indistinguishable on purpose.
    #[error("workflow not found")]
    WorkflowNotFound,

    /// No live session for the given workflow id.
    #[error("session not found")]
    SessionNotFound,

    /// A persisted document references a kind that was never registered.
    #[error("unknown {family} kind: {kind}")]
    UnknownKind { family: &'static str, kind: String },

    /// Encoding or decoding a workflow document failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backing store failed in a way that is not a missing record.
    #[error("storage error: {0}")]
    Storage(String),

    /// A savepoint rollback or commit failed while another error was
    /// already being handled. Keeps both instead of swallowing either.
    #[error("savepoint {op} failed: {source} (while handling: {cause})")]
    TransactionCleanup {
        op: &'static str,
        cause: Box<WorkflowError>,
        #[source]
        source: Box<WorkflowError>,
    },

    /// A business error raised by a collaborator (invalid OTP, duplicate
    /// identity, rate limited). Propagates through accept unchanged and
    /// aborts the current cycle without persisting anything.
    #[error("{0}")]
    Domain(Box<dyn std::error::Error + Send + Sync>),
}

impl WorkflowError {
    /// Wrap a collaborator error so it travels through the engine intact.
    pub fn domain<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WorkflowError::Domain(Box::new(err))
    }

    /// Recover the concrete collaborator error, if this is one.
    pub fn as_domain<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self {
            WorkflowError::Domain(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

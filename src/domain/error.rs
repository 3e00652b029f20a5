// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure in the streaming pipeline falls into one of
// four buckets. None of them is caught and recovered
// internally: a failure mid-buffer-build discards the whole
// in-progress buffer and surfaces to the caller of
// `next_batch()` (or to construction).
//
// Reference: Rust Book §9 (Error Handling)

use thiserror::Error;

/// The failure modes of the activation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The corpus iterator has no more records. Fatal to the
    /// current pipeline instance — no retry or wraparound.
    #[error("corpus source exhausted")]
    SourceExhausted,

    /// A collaborator broke its shape contract: a record
    /// switched modes mid-stream, an activation tensor came
    /// back with the wrong dimensions, or a window batch came
    /// up short.
    #[error("shape invariant violated: {0}")]
    ShapeInvariant(String),

    /// The requested configuration is explicitly unsupported
    /// (e.g. cached-activation loading). Raised at
    /// construction, before any streaming begins.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// An error raised by the tokenizer, the model hook, or
    /// corpus I/O — propagated unmodified, never retried.
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] anyhow::Error),
}

impl StoreError {
    /// Shorthand for a shape-invariant breach with a formatted message
    pub fn shape(msg: impl Into<String>) -> Self {
        StoreError::ShapeInvariant(msg.into())
    }
}

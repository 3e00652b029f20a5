// ============================================================
// Layer 4 — Streaming Activation Pipeline
// ============================================================
// This layer handles everything from raw corpus records all
// the way to shuffled activation batches for SAE training.
//
// The pipeline flows in this order:
//
//   corpus (.jsonl / memory)
//       │
//       ▼
//   WindowPacker        → packs token streams into fixed-length
//       │                 context windows (BOS at split points)
//       ▼
//   ActivationExtractor → runs the hooked model, stacks the
//       │                 monitored layers into one tensor
//       ▼
//   BufferFiller        → fills a flat record buffer, then
//       │                 permutes it uniformly
//       ▼
//   MixScheduler        → mixes the persisted storage half with
//       │                 a fresh buffer, re-splits 50/50
//       ▼
//   BatchCursor         → serves fixed-size training batches,
//                         remixing transparently when exhausted
//
// The two-stage mixing bounds memory to two buffer halves while
// letting every record mix with records from multiple fill
// cycles before it is served. This approximates — it does not
// guarantee — a global shuffle of the corpus: a record can only
// mix with a bounded window of temporal neighbours.
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Bricken et al. (2023) Towards Monosemanticity

use serde::{Deserialize, Serialize};

/// Corpus sources: .jsonl streaming and in-memory
pub mod corpus;

/// Packs token streams into fixed-length context windows
pub mod packer;

/// Extracts per-layer activations for a batch of windows
pub mod extractor;

/// The flat activation buffer and its fill-and-permute builder
pub mod buffer;

/// The double-buffer mixing protocol
pub mod scheduler;

/// Serves an inexhaustible stream of shuffled training batches
pub mod cursor;

#[cfg(test)]
pub mod testing;

// ─── StoreConfig ──────────────────────────────────────────────────────────────
/// Geometry of the activation store, consumed read-only by the
/// pipeline components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Fixed token length of every context window
    pub context_size: usize,

    /// Windows per forward pass while filling a buffer
    pub store_batch_size: usize,

    /// Records per training batch served by the cursor
    pub train_batch_size: usize,

    /// Store batches per buffer half — the storage buffer holds
    /// `half_buffer_batches * store_batch_size` records
    pub half_buffer_batches: usize,

    /// Monitored hook points, in the order their activations
    /// are stacked along the layer axis
    pub hook_points: Vec<String>,

    /// Width of the residual stream the hooks read from
    pub d_model: usize,

    /// Load activations from an on-disk cache instead of the
    /// model. Not implemented — construction fails fast when set.
    pub use_cached_activations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            context_size:           128,
            store_batch_size:       32,
            train_batch_size:       64,
            half_buffer_batches:    64,
            hook_points:            vec!["blocks.0.resid_post".to_string()],
            d_model:                256,
            use_cached_activations: false,
        }
    }
}

impl StoreConfig {
    /// Records held by one buffer half
    pub fn half_buffer_records(&self) -> usize {
        self.half_buffer_batches * self.store_batch_size
    }

    /// Number of monitored layers (the layer axis length)
    pub fn num_layers(&self) -> usize {
        self.hook_points.len()
    }
}

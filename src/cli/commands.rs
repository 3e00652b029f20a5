// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `stream` and `pack`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, u32, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::pack_use_case::PackConfig;
use crate::application::stream_use_case::StreamConfig;
use crate::data::StoreConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream activations and serve shuffled training batches
    Stream(StreamArgs),

    /// Pack context windows only and report statistics
    Pack(PackArgs),
}

/// All arguments for the `stream` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Path to the .jsonl corpus (one {"text"} or {"tokens"} record per line)
    #[arg(long)]
    pub corpus: String,

    /// Path to a HuggingFace tokenizer.json (required for text corpora)
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Boundary-marker token id for pre-tokenized corpora
    /// (resolved from the tokenizer when one is given)
    #[arg(long)]
    pub bos_id: Option<u32>,

    /// Directory to write the metrics CSV into
    #[arg(long, default_value = "metrics")]
    pub metrics_dir: String,

    /// Number of training batches to draw
    #[arg(long, default_value_t = 100)]
    pub num_batches: usize,

    /// Token length of every context window
    #[arg(long, default_value_t = 128)]
    pub context_size: usize,

    /// Windows per forward pass while filling a buffer
    #[arg(long, default_value_t = 32)]
    pub store_batch_size: usize,

    /// Activation records per served training batch
    #[arg(long, default_value_t = 64)]
    pub train_batch_size: usize,

    /// Store batches per buffer half — the storage buffer holds
    /// half_buffer_batches * store_batch_size records
    #[arg(long, default_value_t = 64)]
    pub half_buffer_batches: usize,

    /// Hook point to monitor — repeat the flag to stack
    /// several layers along the layer axis
    #[arg(long = "hook-point", default_value = "blocks.0.resid_post")]
    pub hook_points: Vec<String>,

    /// Width of the residual stream (d_model in the paper)
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// Vocabulary size of the hooked encoder — must cover every
    /// token id the corpus can produce
    #[arg(long, default_value_t = 50257)]
    pub vocab_size: usize,

    /// Attention heads per block (d_model must be divisible by this)
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    /// Stacked encoder blocks in the hooked encoder
    #[arg(long, default_value_t = 2)]
    pub num_blocks: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    /// Load activations from an on-disk cache instead of the
    /// model (not implemented — fails fast)
    #[arg(long, default_value_t = false)]
    pub use_cached_activations: bool,
}

/// Convert CLI StreamArgs into the application-layer StreamConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<StreamArgs> for StreamConfig {
    fn from(a: StreamArgs) -> Self {
        StreamConfig {
            corpus_path:    a.corpus,
            tokenizer_path: a.tokenizer,
            bos_id:         a.bos_id,
            metrics_dir:    a.metrics_dir,
            num_batches:    a.num_batches,
            store: StoreConfig {
                context_size:           a.context_size,
                store_batch_size:       a.store_batch_size,
                train_batch_size:       a.train_batch_size,
                half_buffer_batches:    a.half_buffer_batches,
                hook_points:            a.hook_points,
                d_model:                a.d_model,
                use_cached_activations: a.use_cached_activations,
            },
            vocab_size: a.vocab_size,
            num_heads:  a.num_heads,
            num_blocks: a.num_blocks,
            d_ff:       a.d_ff,
        }
    }
}

/// All arguments for the `pack` command
#[derive(Args, Debug)]
pub struct PackArgs {
    /// Path to the .jsonl corpus
    #[arg(long)]
    pub corpus: String,

    /// Path to a HuggingFace tokenizer.json (required for text corpora)
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Boundary-marker token id for pre-tokenized corpora
    #[arg(long)]
    pub bos_id: Option<u32>,

    /// Token length of every context window
    #[arg(long, default_value_t = 128)]
    pub context_size: usize,

    /// Windows per packer call
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Packer calls to make
    #[arg(long, default_value_t = 10)]
    pub num_batches: usize,
}

impl From<PackArgs> for PackConfig {
    fn from(a: PackArgs) -> Self {
        PackConfig {
            corpus_path:    a.corpus,
            tokenizer_path: a.tokenizer,
            bos_id:         a.bos_id,
            context_size:   a.context_size,
            batch_size:     a.batch_size,
            num_batches:    a.num_batches,
        }
    }
}

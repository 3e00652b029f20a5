// ============================================================
// Layer 2 — PackUseCase
// ============================================================
// Runs only the corpus → packer front of the pipeline and
// reports window statistics. Useful for checking a corpus and
// context size before paying for activation extraction.

use anyhow::{Context, Result};

use crate::data::{corpus::JsonlCorpus, packer::WindowPacker};
use crate::domain::traits::TokenEncoder;
use crate::infra::tokenizer_store::TokenizerStore;

// ─── Packing Configuration ────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct PackConfig {
    pub corpus_path:    String,
    pub tokenizer_path: Option<String>,
    pub bos_id:         Option<u32>,
    pub context_size:   usize,
    /// Windows per packer call
    pub batch_size:     usize,
    /// Packer calls to make
    pub num_batches:    usize,
}

/// What the packer produced over one inspection run
#[derive(Debug, Clone)]
pub struct PackReport {
    pub windows:          usize,
    pub tokens:           usize,
    /// Occurrences of the boundary-marker id across all windows
    pub boundary_markers: usize,
}

// ─── PackUseCase ──────────────────────────────────────────────────────────────
pub struct PackUseCase {
    config: PackConfig,
}

impl PackUseCase {
    pub fn new(config: PackConfig) -> Self {
        Self { config }
    }

    /// Pull `num_batches` window batches and tally them.
    pub fn execute(&self) -> Result<PackReport> {
        let cfg = &self.config;

        let corpus = JsonlCorpus::open(&cfg.corpus_path)?;

        let (encoder, bos_id): (Option<Box<dyn TokenEncoder>>, u32) =
            match &cfg.tokenizer_path {
                Some(path) => {
                    let tokenizer = TokenizerStore::new(path).load(cfg.context_size)?;
                    let bos = tokenizer.bos_id();
                    (Some(Box::new(tokenizer)), bos)
                }
                None => {
                    let bos = cfg.bos_id.context(
                        "a corpus without a tokenizer needs an explicit --bos-id",
                    )?;
                    (None, bos)
                }
            };

        let mut packer =
            WindowPacker::new(Box::new(corpus), encoder, bos_id, cfg.context_size);

        let mut report = PackReport { windows: 0, tokens: 0, boundary_markers: 0 };

        for _ in 0..cfg.num_batches {
            let windows = packer.next_window_batch(cfg.batch_size)?;

            report.windows += windows.len();
            for window in &windows {
                report.tokens += window.len();
                report.boundary_markers +=
                    window.iter().filter(|&&t| t == bos_id).count();
            }
        }

        tracing::info!(
            "Packed {} windows ({} tokens, {} boundary markers)",
            report.windows, report.tokens, report.boundary_markers,
        );
        Ok(report)
    }
}

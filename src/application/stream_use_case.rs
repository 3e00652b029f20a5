// ============================================================
// Layer 2 — StreamUseCase
// ============================================================
// Orchestrates the full activation-streaming pipeline in order:
//
//   Step 1: Open the corpus stream       (Layer 4 - data)
//   Step 2: Load tokenizer / BOS id      (Layer 6 - infra)
//   Step 3: Build the hooked encoder     (Layer 5 - ml)
//   Step 4: Assemble packer → extractor
//           → filler → scheduler → cursor (Layer 4 - data)
//   Step 5: Draw batches, log metrics    (Layer 6 - infra)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §4 (Datasets and Dataloaders)

use anyhow::{Context, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{
    buffer::BufferFiller,
    corpus::JsonlCorpus,
    cursor::BatchCursor,
    extractor::ActivationExtractor,
    packer::WindowPacker,
    scheduler::MixScheduler,
    StoreConfig,
};
use crate::domain::traits::TokenEncoder;
use crate::infra::{
    metrics::{BatchMetrics, MetricsLogger},
    tokenizer_store::TokenizerStore,
};
use crate::ml::model::{HookedEncoder, HookedEncoderConfig};

type StoreBackend = burn::backend::NdArray;

// ─── Streaming Configuration ─────────────────────────────────────────────────
// Everything one streaming run needs. Serialisable so a run can
// be recorded alongside its metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Path to the .jsonl corpus — the dataset identifier
    pub corpus_path:    String,
    /// tokenizer.json for text corpora; pre-tokenized corpora
    /// may omit it and pass an explicit BOS id instead
    pub tokenizer_path: Option<String>,
    /// Explicit BOS id (required when no tokenizer is given)
    pub bos_id:         Option<u32>,
    pub metrics_dir:    String,
    /// Training batches to draw before stopping
    pub num_batches:    usize,

    /// Buffer and batch geometry
    pub store: StoreConfig,

    /// Hooked-encoder geometry
    pub vocab_size: usize,
    pub num_heads:  usize,
    pub num_blocks: usize,
    pub d_ff:       usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            corpus_path:    "data/corpus.jsonl".to_string(),
            tokenizer_path: None,
            bos_id:         None,
            metrics_dir:    "metrics".to_string(),
            num_batches:    100,
            store:          StoreConfig::default(),
            vocab_size:     50257,
            num_heads:      8,
            num_blocks:     2,
            d_ff:           1024,
        }
    }
}

// ─── StreamUseCase ────────────────────────────────────────────────────────────
// Owns the config and runs the full streaming pipeline.
pub struct StreamUseCase {
    config: StreamConfig,
}

impl StreamUseCase {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline end to end: assemble it, draw
    /// `num_batches` training batches, log their statistics.
    pub fn execute(&self) -> Result<()> {
        let cfg    = &self.config;
        let device = Default::default();

        // ── Step 1: Open the corpus stream ────────────────────────────────────
        let corpus = JsonlCorpus::open(&cfg.corpus_path)?;

        // ── Step 2: Tokenizer and boundary-marker id ──────────────────────────
        // Text corpora need the tokenizer; pre-tokenized corpora
        // only need to be told which id marks a sequence start.
        let (encoder, bos_id): (Option<Box<dyn TokenEncoder>>, u32) =
            match &cfg.tokenizer_path {
                Some(path) => {
                    let tokenizer =
                        TokenizerStore::new(path).load(cfg.store.context_size)?;
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

        // ── Step 3: Build the hooked encoder ──────────────────────────────────
        let model_cfg = HookedEncoderConfig::new(
            cfg.vocab_size, cfg.store.context_size, cfg.store.d_model,
            cfg.num_heads, cfg.num_blocks, cfg.d_ff, 0.0,
        );
        let model: HookedEncoder<StoreBackend> = model_cfg.init(&device);
        tracing::info!(
            "Hooked encoder ready: {} blocks, d_model={}",
            cfg.num_blocks, cfg.store.d_model
        );
        tracing::info!(
            "Buffer halves hold {} records across {} monitored layer(s)",
            cfg.store.half_buffer_records(),
            cfg.store.num_layers(),
        );

        // ── Step 4: Assemble the pipeline ─────────────────────────────────────
        let packer = WindowPacker::new(
            Box::new(corpus), encoder, bos_id, cfg.store.context_size,
        );
        let extractor = ActivationExtractor::new(
            Box::new(model),
            cfg.store.hook_points.clone(),
            cfg.store.d_model,
            device.clone(),
        );
        let filler    = BufferFiller::new(&cfg.store, packer, extractor, device)?;
        let scheduler = MixScheduler::new(filler, cfg.store.half_buffer_batches)?;
        let mut cursor = BatchCursor::new(cfg.store.train_batch_size, scheduler)?;

        // ── Step 5: Draw batches and log metrics ──────────────────────────────
        let metrics = MetricsLogger::new(&cfg.metrics_dir)?;

        for batch_idx in 1..=cfg.num_batches {
            let batch   = cursor.next_batch()?;
            let records = batch.dims()[0];

            let mean: f64    = batch.clone().mean().into_scalar().elem::<f64>();
            let max_abs: f64 = batch.abs().max().into_scalar().elem::<f64>();

            metrics.log(&BatchMetrics::new(batch_idx, records, mean, max_abs))?;

            if batch_idx % 10 == 0 {
                tracing::info!(
                    "Batch {}/{}: mean={:.4}, max_abs={:.4}",
                    batch_idx, cfg.num_batches, mean, max_abs,
                );
            }
        }

        tracing::info!(
            "Served {} batches over {} remix cycles; metrics in '{}'",
            cfg.num_batches,
            cursor.cycles(),
            metrics.csv_path().display(),
        );
        Ok(())
    }
}

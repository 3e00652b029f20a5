// ============================================================
// Layer 4 — Shared Test Fixtures
// ============================================================
// Deterministic collaborator stand-ins used by the pipeline
// unit tests. The model stub broadcasts each token id across
// d_model (plus 1000 per layer index), so every activation
// value identifies its source token and hook exactly — which
// lets tests check conservation through shuffles by comparing
// per-record sums.

use burn::prelude::*;
use std::collections::HashMap;

use crate::data::corpus::MemoryCorpus;
use crate::data::extractor::{ActivationExtractor, ActivationModel};
use crate::data::packer::WindowPacker;
use crate::domain::error::StoreError;

pub type TestBackend = burn::backend::NdArray;

/// Activation value = token id + 1000 × layer index.
pub struct TokenValueModel {
    pub d_model: usize,
}

impl ActivationModel<TestBackend> for TokenValueModel {
    fn run_with_cache(
        &self,
        input_ids:   Tensor<TestBackend, 2, Int>,
        hook_points: &[String],
    ) -> Result<HashMap<String, Tensor<TestBackend, 3>>, StoreError> {
        let [b, ctx] = input_ids.dims();
        let base = input_ids
            .float()
            .unsqueeze_dim::<3>(2)
            .expand([b, ctx, self.d_model]);

        Ok(hook_points
            .iter()
            .enumerate()
            .map(|(i, hook)| (hook.clone(), base.clone() + (i as f32) * 1000.0))
            .collect())
    }
}

/// A corpus of `n_records` pre-tokenized records where record i
/// holds the ids `[stride * i, stride * i + len)` — strictly
/// increasing across the corpus so window sums stay unique.
pub fn counting_corpus(n_records: usize, len: usize, stride: u32) -> MemoryCorpus {
    MemoryCorpus::from_token_seqs(
        (0..n_records as u32)
            .map(|i| (stride * i..stride * i + len as u32).collect())
            .collect(),
    )
}

/// Packer over a counting corpus with BOS id 0 (so boundary
/// markers never perturb record-sum uniqueness).
pub fn counting_packer(
    n_records:    usize,
    len:          usize,
    stride:       u32,
    context_size: usize,
) -> WindowPacker {
    WindowPacker::new(
        Box::new(counting_corpus(n_records, len, stride)),
        None,
        0,
        context_size,
    )
}

/// Extractor over the token-value model with a single hook.
pub fn token_value_extractor(d_model: usize) -> ActivationExtractor<TestBackend> {
    ActivationExtractor::new(
        Box::new(TokenValueModel { d_model }),
        vec!["blocks.0.resid_post".to_string()],
        d_model,
        Default::default(),
    )
}

/// Per-record sums of a `[n, ctx, layers, d_model]` tensor —
/// a multiset fingerprint that survives permutation.
pub fn record_sums(records: Tensor<TestBackend, 4>) -> Vec<f32> {
    let [n, ctx, layers, d_model] = records.dims();
    let flat: Vec<f32> = records.into_data().to_vec().unwrap();
    flat.chunks(ctx * layers * d_model)
        .map(|chunk| chunk.iter().sum())
        .take(n)
        .collect()
}

/// Sorted copy, for multiset comparison.
pub fn sorted(mut sums: Vec<f32>) -> Vec<f32> {
    sums.sort_by(|a, b| a.partial_cmp(b).unwrap());
    sums
}

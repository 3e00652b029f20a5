// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads a tokenizer.json (HuggingFace format) from disk and
// adapts it to the domain TokenEncoder trait.
//
// The packer needs two things from a tokenizer: flat token-id
// sequences truncated to the model's maximum length, and the
// reserved BOS id it inserts at window splits. The BOS id is
// resolved from the loaded vocabulary by probing the common
// spellings, because tokenizer.json files disagree on the
// token's surface form.
//
// Reference: Sennrich et al. (2016) BPE paper

use anyhow::Result;
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::domain::error::StoreError;
use crate::domain::traits::TokenEncoder;

/// BOS spellings probed against the vocabulary, in order
const BOS_CANDIDATES: [&str; 4] = ["<s>", "<|endoftext|>", "[CLS]", "<bos>"];

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the tokenizer and wrap it for the pipeline.
    /// `max_tokens` caps every encoded sequence (the model's
    /// maximum context).
    pub fn load(&self, max_tokens: usize) -> Result<CorpusTokenizer> {
        let inner = Tokenizer::from_file(&self.path)
            .map_err(|e| anyhow::anyhow!(
                "cannot load tokenizer from '{}': {}", self.path.display(), e
            ))?;

        let bos_id = BOS_CANDIDATES
            .iter()
            .find_map(|token| inner.token_to_id(token))
            .ok_or_else(|| anyhow::anyhow!(
                "no BOS token found in '{}' (tried {:?})",
                self.path.display(),
                BOS_CANDIDATES
            ))?;

        tracing::info!(
            "Tokenizer loaded from '{}' (BOS id {})",
            self.path.display(),
            bos_id
        );

        Ok(CorpusTokenizer { inner, bos_id, max_tokens })
    }
}

/// A loaded tokenizer behind the TokenEncoder trait.
pub struct CorpusTokenizer {
    inner:      Tokenizer,
    bos_id:     u32,
    max_tokens: usize,
}

impl TokenEncoder for CorpusTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, StoreError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| StoreError::Collaborator(anyhow::anyhow!("tokenisation error: {e}")))?;

        let mut ids = encoding.get_ids().to_vec();
        ids.truncate(self.max_tokens);
        Ok(ids)
    }

    fn bos_id(&self) -> u32 {
        self.bos_id
    }
}

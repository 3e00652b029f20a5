use burn::{
    nn::{
        attention::{MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};
use std::collections::HashMap;

use crate::data::extractor::ActivationModel;
use crate::domain::error::StoreError;

/// Hook point on the embedding output (pre-block residual stream)
pub const HOOK_EMBED: &str = "embed";

/// Hook point on the final layer norm output
pub const HOOK_FINAL_NORM: &str = "final_norm";

/// Hook point on the residual stream after block `i`
pub fn resid_post_hook(block: usize) -> String {
    format!("blocks.{block}.resid_post")
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct HookedEncoderConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_blocks:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl HookedEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> HookedEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let blocks: Vec<EncoderBlock<B>> = (0..self.num_blocks)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        HookedEncoder {
            token_embedding, position_embedding, blocks,
            final_norm, dropout,
            max_seq_len: self.max_seq_len,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        use burn::nn::attention::MhaInput;
        let attn_output = self.self_attn.forward(MhaInput::self_attn(x.clone())).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

/// A transformer encoder whose residual stream can be read at
/// named hook points during the forward pass.
#[derive(Module, Debug)]
pub struct HookedEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub blocks:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

impl<B: Backend> HookedEncoder<B> {
    /// input_ids: [batch, seq_len] → map of hook name to
    /// activations of shape [batch, seq_len, d_model].
    ///
    /// Only the requested hook points are captured; every
    /// requested name must exist on this model.
    pub fn forward_with_cache(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        hook_points: &[String],
    ) -> Result<HashMap<String, Tensor<B, 3>>, StoreError> {
        let [batch_size, seq_len] = input_ids.dims();
        if seq_len > self.max_seq_len {
            return Err(StoreError::shape(format!(
                "sequence length {seq_len} exceeds model maximum {}",
                self.max_seq_len
            )));
        }

        let wanted = |name: &str| hook_points.iter().any(|h| h == name);
        let mut cache = HashMap::new();

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        if wanted(HOOK_EMBED) {
            cache.insert(HOOK_EMBED.to_string(), x.clone());
        }

        for (i, block) in self.blocks.iter().enumerate() {
            x = block.forward(x);
            let name = resid_post_hook(i);
            if wanted(&name) {
                cache.insert(name, x.clone());
            }
        }

        if wanted(HOOK_FINAL_NORM) {
            cache.insert(HOOK_FINAL_NORM.to_string(), self.final_norm.forward(x));
        }

        for hook in hook_points {
            if !cache.contains_key(hook) {
                return Err(StoreError::UnsupportedConfiguration(format!(
                    "unknown hook point '{hook}' (model has {} blocks)",
                    self.blocks.len()
                )));
            }
        }

        Ok(cache)
    }
}

impl<B: Backend> ActivationModel<B> for HookedEncoder<B> {
    fn run_with_cache(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        hook_points: &[String],
    ) -> Result<HashMap<String, Tensor<B, 3>>, StoreError> {
        self.forward_with_cache(input_ids, hook_points)
    }
}

// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The concrete activation-model collaborator: a transformer
// encoder instrumented with named hook points on its residual
// stream. The pipeline itself only sees the ActivationModel
// trait — this layer provides the in-crate implementation the
// CLI runs against.
//
// What's in this layer:
//
//   model.rs — The hooked transformer encoder
//              • Token + positional embeddings
//              • Stacked self-attention blocks (GELU FFN,
//                layer norm, residual connections)
//              • Named hook points: "embed",
//                "blocks.{i}.resid_post", "final_norm"
//              • forward_with_cache() captures the requested
//                intermediate tensors in one pass
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017) Attention Is All You Need
//            Elhage et al. (2021) A Mathematical Framework for
//            Transformer Circuits (residual stream view)

/// Hooked transformer encoder — the activation source
pub mod model;

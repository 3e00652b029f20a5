// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   tokenizer_store.rs — Tokenizer loading
//                        Loads a HuggingFace tokenizer.json
//                        from disk and wraps it behind the
//                        TokenEncoder trait, resolving the
//                        boundary-marker (BOS) id from the
//                        vocabulary.
//
//   metrics.rs         — Stream metrics logging
//                        Writes per-batch summary statistics
//                        of the served activations to a CSV
//                        file for later analysis and plotting.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Tokenizer loading and the TokenEncoder adapter
pub mod tokenizer_store;

/// Activation stream metrics CSV logger
pub mod metrics;

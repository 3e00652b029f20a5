// ============================================================
// Layer 4 — Activation Extractor
// ============================================================
// Wraps the opaque model collaborator: hand it a batch of
// token windows, get back one tensor holding the activations
// of every monitored hook point.
//
// How extraction works here:
//   Input:  N TokenWindows of length ctx
//   Output: Tensor of shape [N, ctx, num_layers, d_model]
//
//   We flatten all window ids into one long Vec, reshape to
//   [N, ctx], run the model once per batch, then stack the
//   per-hook tensors along a new layer axis in the exact order
//   the hooks were requested.
//
// No numeric transformation happens here — values are whatever
// the model returns, on whatever device the backend places them.
//
// Reference: Burn Book §4 (Batcher)

use burn::prelude::*;
use std::collections::HashMap;

use crate::domain::error::StoreError;
use crate::domain::record::TokenWindow;

// ─── ActivationModel ──────────────────────────────────────────────────────────
/// The model-activation capability consumed by the extractor.
///
/// Implementations:
///   - ml::model::HookedEncoder → in-crate transformer encoder
///   - any backend exposing named intermediate tensors
pub trait ActivationModel<B: Backend> {
    /// Run a forward pass over `input_ids` of shape
    /// `[batch, context]` and return the activations of every
    /// requested hook point, each of shape
    /// `[batch, context, d_model]`.
    fn run_with_cache(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        hook_points: &[String],
    ) -> Result<HashMap<String, Tensor<B, 3>>, StoreError>;
}

// ─── ActivationExtractor ──────────────────────────────────────────────────────
/// Turns token windows into stacked per-layer activations.
pub struct ActivationExtractor<B: Backend> {
    model:       Box<dyn ActivationModel<B>>,
    /// Ordered — position in this list is position on the layer axis
    hook_points: Vec<String>,
    d_model:     usize,
    device:      B::Device,
}

impl<B: Backend> ActivationExtractor<B> {
    /// # Panics
    /// Panics if `hook_points` is empty — there would be no
    /// layer axis to build.
    pub fn new(
        model:       Box<dyn ActivationModel<B>>,
        hook_points: Vec<String>,
        d_model:     usize,
        device:      B::Device,
    ) -> Self {
        assert!(!hook_points.is_empty(), "at least one hook point is required");
        Self { model, hook_points, d_model, device }
    }

    /// Number of monitored layers (length of the layer axis)
    pub fn num_layers(&self) -> usize {
        self.hook_points.len()
    }

    /// Extract activations for a batch of windows.
    ///
    /// Returns a tensor of shape
    /// `[windows.len(), context_size, num_layers, d_model]`.
    pub fn extract(&self, windows: &[TokenWindow]) -> Result<Tensor<B, 4>, StoreError> {
        let batch_size = windows.len();
        if batch_size == 0 {
            return Err(StoreError::shape("cannot extract from an empty window batch"));
        }

        let context_size = windows[0].len();
        for (i, w) in windows.iter().enumerate() {
            if w.len() != context_size {
                return Err(StoreError::shape(format!(
                    "window {i} has {} tokens, expected {context_size}",
                    w.len()
                )));
            }
        }

        // Flatten [N windows of ctx ids] → one Vec, then reshape
        let flat: Vec<i32> = windows
            .iter()
            .flat_map(|w| w.iter().map(|&t| t as i32))
            .collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, context_size]);

        // One model call per batch
        let mut cache = self.model.run_with_cache(input_ids, &self.hook_points)?;

        // Collect hooks in request order, validating every shape
        let mut layers = Vec::with_capacity(self.hook_points.len());
        for hook in &self.hook_points {
            let act = cache.remove(hook).ok_or_else(|| {
                StoreError::shape(format!("hook '{hook}' missing from model cache"))
            })?;

            let dims = act.dims();
            if dims != [batch_size, context_size, self.d_model] {
                return Err(StoreError::shape(format!(
                    "hook '{hook}' returned shape {dims:?}, expected [{batch_size}, {context_size}, {}]",
                    self.d_model
                )));
            }
            layers.push(act);
        }

        // Stack along a new layer axis to keep layers distinct
        Ok(Tensor::stack::<4>(layers, 2))
    }
}

// ============================================================
// Layer 4 — Activation Buffers
// ============================================================
// A buffer is a dense, ordered run of activation records: one
// tensor of shape [n, context_size, num_layers, d_model] whose
// axis 0 is the record axis. Buffers are permuted, concatenated
// and split along that axis only.
//
// BufferFiller produces them: it allocates the full tensor up
// front (so a partial fill shows up as a shape mismatch instead
// of a silently short buffer), fills it one store-batch slice
// at a time through the packer and extractor, then applies one
// uniform random permutation over the records.
//
// Uses Fisher-Yates via rand::seq::SliceRandom to draw the
// permutation — every ordering is equally likely.
//
// Reference: rand crate documentation
//            Burn Book §4 (Datasets and Dataloaders)

use burn::prelude::*;
use rand::seq::SliceRandom;

use crate::data::extractor::ActivationExtractor;
use crate::data::packer::WindowPacker;
use crate::data::StoreConfig;
use crate::domain::error::StoreError;

// ─── ActivationBuffer ─────────────────────────────────────────────────────────
/// An owned run of activation records.
#[derive(Debug, Clone)]
pub struct ActivationBuffer<B: Backend> {
    /// Shape [n, context_size, num_layers, d_model]
    records: Tensor<B, 4>,
}

impl<B: Backend> ActivationBuffer<B> {
    pub fn new(records: Tensor<B, 4>) -> Self {
        Self { records }
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of one record: [context_size, num_layers, d_model]
    pub fn record_shape(&self) -> [usize; 3] {
        let [_, ctx, layers, d_model] = self.records.dims();
        [ctx, layers, d_model]
    }

    pub fn into_tensor(self) -> Tensor<B, 4> {
        self.records
    }

    /// Reorder the records by one uniform random permutation.
    pub fn shuffled(self) -> Self {
        let n = self.len();
        let mut order: Vec<i32> = (0..n as i32).collect();
        order.shuffle(&mut rand::thread_rng());

        let device = self.records.device();
        let index  = Tensor::<B, 1, Int>::from_ints(order.as_slice(), &device);
        Self { records: self.records.select(0, index) }
    }

    /// Join two buffers along the record axis, `first` records
    /// ahead of `second`.
    pub fn concat(first: Self, second: Self) -> Self {
        Self { records: Tensor::cat(vec![first.records, second.records], 0) }
    }

    /// Split into two halves along the record axis. The record
    /// count must be even — mixing always doubles a half.
    pub fn split_half(self) -> (Self, Self) {
        let [n, ctx, layers, d_model] = self.records.dims();
        debug_assert!(n % 2 == 0, "splitting an odd-length buffer");
        let half = n / 2;

        let first = self
            .records
            .clone()
            .slice([0..half, 0..ctx, 0..layers, 0..d_model]);
        let second = self
            .records
            .slice([half..n, 0..ctx, 0..layers, 0..d_model]);

        (Self { records: first }, Self { records: second })
    }

    /// Gather the records at `indices`, in order.
    pub fn select(&self, indices: &[i32]) -> Tensor<B, 4> {
        let device = self.records.device();
        let index  = Tensor::<B, 1, Int>::from_ints(indices, &device);
        self.records.clone().select(0, index)
    }
}

// ─── BufferFiller ─────────────────────────────────────────────────────────────
/// Builds freshly permuted buffers from the corpus stream.
pub struct BufferFiller<B: Backend> {
    packer:           WindowPacker,
    extractor:        ActivationExtractor<B>,
    context_size:     usize,
    store_batch_size: usize,
    d_model:          usize,
    device:           B::Device,
}

impl<B: Backend> BufferFiller<B> {
    /// Fails fast with `UnsupportedConfiguration` when
    /// cached-activation loading is requested — that path is
    /// deliberately unimplemented, and the failure must happen
    /// before any streaming begins.
    pub fn new(
        cfg:       &StoreConfig,
        packer:    WindowPacker,
        extractor: ActivationExtractor<B>,
        device:    B::Device,
    ) -> Result<Self, StoreError> {
        if cfg.use_cached_activations {
            return Err(StoreError::UnsupportedConfiguration(
                "cached activation loading is not implemented".to_string(),
            ));
        }

        Ok(Self {
            packer,
            extractor,
            context_size:     cfg.context_size,
            store_batch_size: cfg.store_batch_size,
            d_model:          cfg.d_model,
            device,
        })
    }

    /// Build a permuted buffer of `store_batch_size × n_batches`
    /// records.
    ///
    /// Any packer or extractor failure propagates unmodified and
    /// the in-progress buffer is discarded — a short buffer is
    /// never returned.
    pub fn build(&mut self, n_batches: usize) -> Result<ActivationBuffer<B>, StoreError> {
        let total      = self.store_batch_size * n_batches;
        let num_layers = self.extractor.num_layers();

        // Allocate the whole buffer up front
        let mut buffer = Tensor::<B, 4>::zeros(
            [total, self.context_size, num_layers, self.d_model],
            &self.device,
        );

        let mut filled = 0usize;
        while filled < total {
            let windows = self.packer.next_window_batch(self.store_batch_size)?;
            if windows.len() != self.store_batch_size {
                return Err(StoreError::shape(format!(
                    "packer returned {} windows, expected {}",
                    windows.len(),
                    self.store_batch_size
                )));
            }

            let activations = self.extractor.extract(&windows)?;
            buffer = buffer.slice_assign(
                [
                    filled..filled + self.store_batch_size,
                    0..self.context_size,
                    0..num_layers,
                    0..self.d_model,
                ],
                activations,
            );

            filled += self.store_batch_size;
            tracing::debug!("Buffer fill: {filled}/{total} records");
        }

        Ok(ActivationBuffer::new(buffer).shuffled())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::{
        counting_packer, record_sums, sorted, token_value_extractor, TestBackend,
    };

    fn cfg(context_size: usize, store_batch_size: usize, d_model: usize) -> StoreConfig {
        StoreConfig {
            context_size,
            store_batch_size,
            d_model,
            ..StoreConfig::default()
        }
    }

    fn buffer_of(values: &[f32]) -> ActivationBuffer<TestBackend> {
        // One record per value, record shape [1, 1, 2]
        let flat: Vec<f32> = values.iter().flat_map(|&v| [v, v]).collect();
        ActivationBuffer::new(
            Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), &Default::default())
                .reshape([values.len(), 1, 1, 2]),
        )
    }

    #[test]
    fn test_build_returns_exactly_the_requested_records() {
        // store_batch_size=2, three batches worth → 6 records,
        // each of shape (context_size, 1, d_model)
        let filler_cfg = cfg(4, 2, 8);
        let mut filler = BufferFiller::new(
            &filler_cfg,
            counting_packer(4, 9, 100, 4),
            token_value_extractor(8),
            Default::default(),
        )
        .unwrap();

        let buffer = filler.build(3).unwrap();
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.record_shape(), [4, 1, 8]);

        // Every record came from a distinct window: all six
        // record sums are pairwise distinct even after the
        // permutation.
        let sums = sorted(record_sums(buffer.into_tensor()));
        for pair in sums.windows(2) {
            assert!(pair[0] < pair[1], "duplicate record in fresh buffer");
        }
    }

    #[test]
    fn test_build_failure_propagates_without_a_partial_buffer() {
        // Corpus holds one record — not enough for 2 batches
        let filler_cfg = cfg(4, 2, 4);
        let mut filler = BufferFiller::new(
            &filler_cfg,
            counting_packer(1, 9, 100, 4),
            token_value_extractor(4),
            Default::default(),
        )
        .unwrap();

        assert!(matches!(filler.build(2), Err(StoreError::SourceExhausted)));
    }

    #[test]
    fn test_cached_activations_fail_at_construction() {
        let filler_cfg = StoreConfig {
            use_cached_activations: true,
            ..cfg(4, 2, 4)
        };

        let result = BufferFiller::<TestBackend>::new(
            &filler_cfg,
            counting_packer(1, 9, 100, 4),
            token_value_extractor(4),
            Default::default(),
        );

        assert!(matches!(
            result,
            Err(StoreError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_shuffle_preserves_the_record_multiset() {
        let buffer = buffer_of(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let sums   = sorted(record_sums(buffer.shuffled().into_tensor()));
        assert_eq!(sums, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_concat_shuffle_split_conserves_every_record() {
        // The mixing step in miniature: no record may be lost or
        // duplicated by permute + split.
        let fresh   = buffer_of(&[0.0, 1.0, 2.0]);
        let storage = buffer_of(&[3.0, 4.0, 5.0]);

        let mixed = ActivationBuffer::concat(fresh, storage).shuffled();
        let (first, second) = mixed.split_half();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);

        let mut sums = record_sums(first.into_tensor());
        sums.extend(record_sums(second.into_tensor()));
        assert_eq!(sorted(sums), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_select_gathers_in_index_order() {
        let buffer = buffer_of(&[10.0, 20.0, 30.0]);
        let picked = record_sums(buffer.select(&[2, 0]));
        assert_eq!(picked, vec![60.0, 20.0]);
    }
}

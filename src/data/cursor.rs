// ============================================================
// Layer 4 — Batch Cursor
// ============================================================
// The caller-facing end of the pipeline: an inexhaustible
// sequence of fixed-size training batches.
//
// State machine:
//   SERVING   — a serve buffer with undrawn records remains
//   REFILLING — transiently, while a remix cycle runs
//
// The refill trigger is an explicit state check before every
// draw ("are fewer than train_batch_size records left?"), not
// caught-exception control flow. Within one serve generation
// the draw order is its own uniform permutation — sampling
// without replacement — and a batch is always drawn entirely
// from a single generation, never across two.
//
// A remix can block for a long time: it builds a full fresh
// buffer, which makes many blocking calls to the corpus and
// the model. There is no cancellation or timeout — a hang in a
// collaborator propagates as an unbounded block, and any
// collaborator error surfaces unmodified from `next_batch`.
//
// Reference: Rust Book §17 (State pattern)

use burn::prelude::*;
use rand::seq::SliceRandom;

use crate::data::buffer::ActivationBuffer;
use crate::data::scheduler::MixScheduler;
use crate::domain::error::StoreError;

// ─── ServeState ───────────────────────────────────────────────────────────────
/// One serve-buffer generation plus its private draw order.
struct ServeState<B: Backend> {
    buffer: ActivationBuffer<B>,
    /// Shuffled record indices; consumed left to right
    order:  Vec<i32>,
    drawn:  usize,
}

impl<B: Backend> ServeState<B> {
    fn new(buffer: ActivationBuffer<B>) -> Self {
        let mut order: Vec<i32> = (0..buffer.len() as i32).collect();
        order.shuffle(&mut rand::thread_rng());
        Self { buffer, order, drawn: 0 }
    }

    /// Draw the next `batch_size` records, or None when fewer
    /// than a full batch remains.
    fn draw(&mut self, batch_size: usize) -> Option<Tensor<B, 4>> {
        if self.drawn + batch_size > self.order.len() {
            return None;
        }

        let indices = &self.order[self.drawn..self.drawn + batch_size];
        self.drawn += batch_size;
        Some(self.buffer.select(indices))
    }
}

// ─── BatchCursor ──────────────────────────────────────────────────────────────
/// Serves training batches forever, remixing on demand.
pub struct BatchCursor<B: Backend> {
    scheduler:        MixScheduler<B>,
    serve:            Option<ServeState<B>>,
    train_batch_size: usize,
}

impl<B: Backend> BatchCursor<B> {
    /// Wrap a scheduler.
    ///
    /// `train_batch_size` must divide the serve-buffer record
    /// count exactly — otherwise a final short batch would be
    /// unavoidable, and the contract is to fail up front rather
    /// than ever serve one (or silently drop the remainder).
    pub fn new(
        train_batch_size: usize,
        scheduler:        MixScheduler<B>,
    ) -> Result<Self, StoreError> {
        let serve_records = scheduler.storage_len();
        if train_batch_size == 0 || serve_records % train_batch_size != 0 {
            return Err(StoreError::UnsupportedConfiguration(format!(
                "train_batch_size {train_batch_size} must divide the \
                 serve buffer record count {serve_records}"
            )));
        }

        Ok(Self { scheduler, serve: None, train_batch_size })
    }

    /// The next training batch, of shape
    /// `[train_batch_size, context_size, num_layers, d_model]`.
    ///
    /// Exactly `train_batch_size` records every time; when the
    /// current serve buffer runs dry this blocks on a full
    /// remix cycle first.
    pub fn next_batch(&mut self) -> Result<Tensor<B, 4>, StoreError> {
        if let Some(state) = self.serve.as_mut() {
            if let Some(batch) = state.draw(self.train_batch_size) {
                return Ok(batch);
            }
        }

        // Serve buffer exhausted (or first call) — remix.
        let buffer    = self.scheduler.remix()?;
        let mut state = ServeState::new(buffer);

        let batch = state.draw(self.train_batch_size).ok_or_else(|| {
            StoreError::shape("serve buffer holds fewer records than one training batch")
        })?;

        self.serve = Some(state);
        Ok(batch)
    }

    /// Completed remix cycles
    pub fn cycles(&self) -> usize {
        self.scheduler.cycles()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::buffer::BufferFiller;
    use crate::data::testing::{
        counting_packer, record_sums, sorted, token_value_extractor, TestBackend,
    };
    use crate::data::StoreConfig;

    // context 2, 2 windows per store batch, 2 batches per half
    // → serve buffers of 4 records; each 5-token record yields
    // one full store batch.
    fn cursor(
        n_records:        usize,
        train_batch_size: usize,
    ) -> Result<BatchCursor<TestBackend>, StoreError> {
        let cfg = StoreConfig {
            context_size:        2,
            store_batch_size:    2,
            half_buffer_batches: 2,
            train_batch_size,
            d_model:             4,
            ..StoreConfig::default()
        };
        let filler = BufferFiller::new(
            &cfg,
            counting_packer(n_records, 5, 100, 2),
            token_value_extractor(4),
            Default::default(),
        )?;
        let scheduler = MixScheduler::new(filler, cfg.half_buffer_batches)?;
        BatchCursor::new(cfg.train_batch_size, scheduler)
    }

    #[test]
    fn test_batches_have_the_exact_configured_shape() {
        let mut cursor = cursor(8, 2).unwrap();
        let batch = cursor.next_batch().unwrap();
        assert_eq!(batch.dims(), [2, 2, 1, 4]);
    }

    #[test]
    fn test_one_serve_generation_is_drawn_without_repeats() {
        // Serve buffer of 4 records, batches of 2: the first two
        // draws must cover 4 pairwise-distinct records from one
        // generation before any further remix runs.
        let mut cursor = cursor(8, 2).unwrap();

        let mut sums = record_sums(cursor.next_batch().unwrap());
        sums.extend(record_sums(cursor.next_batch().unwrap()));
        assert_eq!(cursor.cycles(), 1);

        let sums = sorted(sums);
        assert_eq!(sums.len(), 4);
        for pair in sums.windows(2) {
            assert!(pair[0] < pair[1], "record repeated within a serve generation");
        }

        // The third draw exhausts the generation and remixes
        cursor.next_batch().unwrap();
        assert_eq!(cursor.cycles(), 2);
    }

    #[test]
    fn test_indivisible_batch_geometry_fails_at_construction() {
        assert!(matches!(
            cursor(8, 3),
            Err(StoreError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_batch_size_fails_at_construction() {
        assert!(matches!(
            cursor(8, 0),
            Err(StoreError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_exhaustion_during_refill_reaches_the_caller() {
        // 4 records: 2 for initialisation, 2 for the first remix.
        // The second remix finds an empty corpus.
        let mut cursor = cursor(4, 2).unwrap();

        cursor.next_batch().unwrap();
        cursor.next_batch().unwrap();
        assert!(matches!(
            cursor.next_batch(),
            Err(StoreError::SourceExhausted)
        ));
    }
}

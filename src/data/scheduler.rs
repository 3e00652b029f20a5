// ============================================================
// Layer 4 — Mix Scheduler
// ============================================================
// The double-buffer mixing protocol. The scheduler exclusively
// owns the persisted "storage" half of records and replaces it
// wholesale every cycle:
//
//   1. Build a fresh buffer sized to the storage half
//   2. Concatenate [fresh, storage] along the record axis
//   3. Permute the concatenation uniformly
//   4. Split exactly in half: first half → new storage,
//      second half → serve buffer (returned to the caller)
//
// Memory stays bounded at two halves, yet every record mixes
// with records from several distinct fill cycles before it is
// served. This approximates a global shuffle — it is NOT one:
// a record can only ever mix with a bounded window of its
// temporal neighbours in the corpus.
//
// Invariant: the storage size never changes after the initial
// half-fill, and every serve buffer has exactly that size.
//
// Reference: Bricken et al. (2023) Towards Monosemanticity
//            (appendix on activation buffer mixing)

use burn::prelude::*;

use crate::data::buffer::{ActivationBuffer, BufferFiller};
use crate::domain::error::StoreError;

/// Owns the storage buffer and runs remix cycles.
pub struct MixScheduler<B: Backend> {
    filler:       BufferFiller<B>,
    storage:      ActivationBuffer<B>,
    half_batches: usize,
    cycles:       usize,
}

impl<B: Backend> MixScheduler<B> {
    /// Create the scheduler and eagerly fill the storage half.
    /// This is the first point the pipeline touches the corpus.
    pub fn new(mut filler: BufferFiller<B>, half_batches: usize) -> Result<Self, StoreError> {
        let storage = filler.build(half_batches)?;
        tracing::info!("Storage buffer initialised: {} records", storage.len());

        Ok(Self { filler, storage, half_batches, cycles: 0 })
    }

    /// Run one remix cycle and return the serve buffer.
    ///
    /// Any failure while building the fresh half propagates
    /// unmodified; the storage buffer is left untouched in that
    /// case so the caller sees a clean failure, not a
    /// half-mixed store.
    pub fn remix(&mut self) -> Result<ActivationBuffer<B>, StoreError> {
        // 1. Fresh buffer, same size as the storage half
        let fresh = self.filler.build(self.half_batches)?;
        if fresh.len() != self.storage.len() {
            return Err(StoreError::shape(format!(
                "fresh buffer holds {} records, storage holds {}",
                fresh.len(),
                self.storage.len()
            )));
        }

        // 2. + 3. Concatenate and permute the union
        let mixed = ActivationBuffer::concat(fresh, self.storage.clone()).shuffled();

        // 4. First half persists, second half is served
        let (storage, serve) = mixed.split_half();
        self.storage = storage;
        self.cycles += 1;

        tracing::info!(
            "Remix cycle {}: storage={} records, serve={} records",
            self.cycles,
            self.storage.len(),
            serve.len()
        );

        Ok(serve)
    }

    /// Completed remix cycles
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Records currently persisted in storage
    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::{counting_packer, token_value_extractor, TestBackend};
    use crate::data::StoreConfig;

    // context 2, 3 windows per store batch, one batch per half:
    // each 7-token record yields exactly one full store batch.
    fn scheduler(n_records: usize) -> Result<MixScheduler<TestBackend>, StoreError> {
        let cfg = StoreConfig {
            context_size:        2,
            store_batch_size:    3,
            half_buffer_batches: 1,
            d_model:             4,
            ..StoreConfig::default()
        };
        let filler = BufferFiller::new(
            &cfg,
            counting_packer(n_records, 7, 100, 2),
            token_value_extractor(4),
            Default::default(),
        )?;
        MixScheduler::new(filler, cfg.half_buffer_batches)
    }

    #[test]
    fn test_initialisation_half_fills_storage() {
        let scheduler = scheduler(4).unwrap();
        assert_eq!(scheduler.storage_len(), 3);
        assert_eq!(scheduler.cycles(), 0);
    }

    #[test]
    fn test_storage_and_serve_sizes_stay_constant_across_cycles() {
        let mut scheduler = scheduler(4).unwrap();

        for cycle in 1..=3 {
            let serve = scheduler.remix().unwrap();
            assert_eq!(serve.len(), 3);
            assert_eq!(scheduler.storage_len(), 3);
            assert_eq!(scheduler.cycles(), cycle);
        }
    }

    #[test]
    fn test_build_failure_leaves_storage_intact() {
        // Enough records for initialisation only
        let mut scheduler = scheduler(1).unwrap();

        assert!(matches!(
            scheduler.remix(),
            Err(StoreError::SourceExhausted)
        ));
        assert_eq!(scheduler.storage_len(), 3);
        assert_eq!(scheduler.cycles(), 0);
    }
}

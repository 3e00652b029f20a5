// ============================================================
// Layer 4 — Window Packer
// ============================================================
// Packs a stream of corpus records into fixed-length context
// windows for the activation model.
//
// Records rarely line up with the context size, so the packer
// splits long records across window boundaries. Whenever a
// record continues into a new window, a single BOS token is
// prepended to the remainder so the model sees a sequence
// start there.
//
// Example with context_size=4, BOS=99, record = t0..t9:
//   Window 1:  [t0, t1, t2, t3]
//   Window 2:  [99, t4, t5, t6]
//   (window 3 [99, t7, t8, t9] waits in the accumulator until
//    the next record forces it out — an exactly-filled window
//    is only emitted once more tokens arrive)
//
// One record may fill arbitrarily many consecutive windows;
// nothing limits how many tokens come from the same context.
//
// Reference: Rust Book §8 (Vectors and Slices)

use crate::domain::error::StoreError;
use crate::domain::record::{Record, RecordMode, TokenWindow};
use crate::domain::traits::{CorpusSource, TokenEncoder};

/// Streams records from a corpus and emits batches of
/// fixed-length token windows.
///
/// Owns its corpus cursor exclusively — two packers never share
/// an iterator position.
pub struct WindowPacker {
    source:       Box<dyn CorpusSource>,
    /// Required for text corpora, unused for pre-tokenized ones
    encoder:      Option<Box<dyn TokenEncoder>>,
    bos_id:       u32,
    context_size: usize,
    /// Fixed by the first record pulled
    mode:         Option<RecordMode>,
}

impl WindowPacker {
    /// Create a packer over `source`.
    ///
    /// # Panics
    /// Panics if `context_size` is zero — no window could ever
    /// be filled.
    pub fn new(
        source:       Box<dyn CorpusSource>,
        encoder:      Option<Box<dyn TokenEncoder>>,
        bos_id:       u32,
        context_size: usize,
    ) -> Self {
        assert!(context_size > 0, "context_size must be at least 1");
        Self { source, encoder, bos_id, context_size, mode: None }
    }

    /// Pull records until `batch_size` full windows are ready
    /// and return exactly that many.
    ///
    /// The window accumulator lives inside this call: if the
    /// batch fills mid-record, the partially accumulated window
    /// and the record's unconsumed remainder are discarded, not
    /// carried into the next call.
    ///
    /// Corpus exhaustion surfaces as `SourceExhausted`; there is
    /// no wraparound.
    pub fn next_window_batch(
        &mut self,
        batch_size: usize,
    ) -> Result<Vec<TokenWindow>, StoreError> {
        let mut windows: Vec<TokenWindow> = Vec::with_capacity(batch_size);
        let mut current: Vec<u32>         = Vec::with_capacity(self.context_size);

        while windows.len() < batch_size {
            let mut pending = self.pull_tokens()?;

            while !pending.is_empty() && windows.len() < batch_size {
                // Space left in the window being accumulated
                let space_left = self.context_size - current.len();

                // The record's remaining tokens fit entirely —
                // note the window is NOT emitted here even when
                // it is now exactly full; the next record's
                // zero-space split flushes it with a BOS prefix.
                if pending.len() <= space_left {
                    current.extend_from_slice(&pending);
                    break;
                }

                // Take as much as will fit
                current.extend_from_slice(&pending[..space_left]);

                // Remove the used part, prepend BOS to the rest
                let mut rest = Vec::with_capacity(pending.len() - space_left + 1);
                rest.push(self.bos_id);
                rest.extend_from_slice(&pending[space_left..]);
                pending = rest;

                // The window is full — emit it and reset
                windows.push(std::mem::replace(
                    &mut current,
                    Vec::with_capacity(self.context_size),
                ));
            }
        }

        windows.truncate(batch_size);
        Ok(windows)
    }

    /// Pull one record and reduce it to a flat token sequence,
    /// pinning the corpus mode on first use.
    fn pull_tokens(&mut self) -> Result<Vec<u32>, StoreError> {
        let record = self.source.next_record()?;
        let mode   = record.mode();

        match self.mode {
            None => {
                tracing::info!(
                    "Corpus mode detected: {}",
                    match mode {
                        RecordMode::Text      => "text (will tokenize)",
                        RecordMode::Tokenized => "pre-tokenized",
                    }
                );
                self.mode = Some(mode);
            }
            Some(fixed) if fixed != mode => {
                return Err(StoreError::shape(format!(
                    "record mode switched from {fixed:?} to {mode:?} mid-stream"
                )));
            }
            Some(_) => {}
        }

        match record {
            Record::Tokens { tokens } => Ok(tokens),
            Record::Text { text } => {
                let encoder = self.encoder.as_ref().ok_or_else(|| {
                    StoreError::UnsupportedConfiguration(
                        "text corpus requires a tokenizer".to_string(),
                    )
                })?;
                encoder.encode(&text)
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::corpus::MemoryCorpus;

    const BOS: u32 = 99;

    fn packer_over(seqs: Vec<Vec<u32>>, context_size: usize) -> WindowPacker {
        WindowPacker::new(
            Box::new(MemoryCorpus::from_token_seqs(seqs)),
            None,
            BOS,
            context_size,
        )
    }

    /// Maps every whitespace word to its character count.
    struct WordLenEncoder;

    impl TokenEncoder for WordLenEncoder {
        fn encode(&self, text: &str) -> Result<Vec<u32>, StoreError> {
            Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
        }

        fn bos_id(&self) -> u32 {
            BOS
        }
    }

    #[test]
    fn test_boundary_token_placement() {
        // record 1 = 0..10, record 2 = 20..30, context 4:
        //   w1 = [0,1,2,3]
        //   w2 = [99,4,5,6]
        //   [99,7,8,9] fills the window exactly and waits;
        //   record 2 flushes it and gains its own BOS prefix
        //   w3 = [99,7,8,9]
        //   w4 = [99,20,21,22]
        let mut packer = packer_over(
            vec![(0..10).collect(), (20..30).collect()],
            4,
        );

        let windows = packer.next_window_batch(4).unwrap();
        assert_eq!(windows[0], vec![0, 1, 2, 3]);
        assert_eq!(windows[1], vec![BOS, 4, 5, 6]);
        assert_eq!(windows[2], vec![BOS, 7, 8, 9]);
        assert_eq!(windows[3], vec![BOS, 20, 21, 22]);
    }

    #[test]
    fn test_every_window_has_exactly_context_size_tokens() {
        let seqs: Vec<Vec<u32>> = (0..12)
            .map(|i| (0..(3 + 7 * i % 23)).map(|t| t as u32).collect())
            .collect();
        let mut packer = packer_over(seqs, 8);

        for _ in 0..3 {
            let windows = packer.next_window_batch(5).unwrap();
            assert_eq!(windows.len(), 5);
            for w in &windows {
                assert_eq!(w.len(), 8);
            }
        }
    }

    #[test]
    fn test_split_record_is_reconstructed_by_stripping_markers() {
        // One oversized record; every non-BOS token across the
        // produced windows must reconstruct it exactly in order.
        let record: Vec<u32> = (100..125).collect();
        let mut packer = packer_over(vec![record.clone(), vec![0]], 5);

        // 25 tokens + 5 continuation markers = 6 windows
        let windows = packer.next_window_batch(6).unwrap();
        let rebuilt: Vec<u32> = windows
            .iter()
            .flatten()
            .copied()
            .filter(|&t| t != BOS)
            .collect();
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn test_batch_fill_discards_partial_accumulator() {
        // context 2: first call consumes [1,2] from record 1 and
        // drops its remainder; the next call starts at record 2.
        let mut packer = packer_over(
            vec![vec![1, 2, 3, 4, 5, 6], vec![7, 8], vec![9, 9, 9]],
            2,
        );

        assert_eq!(packer.next_window_batch(1).unwrap(), vec![vec![1, 2]]);
        assert_eq!(packer.next_window_batch(1).unwrap(), vec![vec![7, 8]]);
    }

    #[test]
    fn test_exhaustion_propagates() {
        let mut packer = packer_over(vec![vec![1, 2]], 4);
        assert!(matches!(
            packer.next_window_batch(1),
            Err(StoreError::SourceExhausted)
        ));
    }

    #[test]
    fn test_empty_corpus_exhausts_immediately() {
        let mut packer = packer_over(vec![], 4);
        assert!(matches!(
            packer.next_window_batch(1),
            Err(StoreError::SourceExhausted)
        ));
    }

    #[test]
    fn test_mode_switch_is_a_shape_violation() {
        let mut packer = WindowPacker::new(
            Box::new(MemoryCorpus::new(vec![
                Record::Tokens { tokens: vec![1, 2, 3, 4, 5] },
                Record::Text { text: "hello".to_string() },
            ])),
            Some(Box::new(WordLenEncoder)),
            BOS,
            4,
        );

        assert!(matches!(
            packer.next_window_batch(2),
            Err(StoreError::ShapeInvariant(_))
        ));
    }

    #[test]
    fn test_text_records_are_encoded() {
        let mut packer = WindowPacker::new(
            Box::new(MemoryCorpus::new(vec![
                Record::Text { text: "a bb ccc dddd".to_string() },
                Record::Text { text: "x".to_string() },
            ])),
            Some(Box::new(WordLenEncoder)),
            BOS,
            4,
        );

        let windows = packer.next_window_batch(1).unwrap();
        assert_eq!(windows[0], vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_text_without_encoder_is_unsupported() {
        let mut packer = WindowPacker::new(
            Box::new(MemoryCorpus::new(vec![Record::Text {
                text: "no tokenizer".to_string(),
            }])),
            None,
            BOS,
            4,
        );

        assert!(matches!(
            packer.next_window_batch(1),
            Err(StoreError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    #[should_panic]
    fn test_zero_context_size_panics() {
        let _ = packer_over(vec![], 0);
    }
}

// ============================================================
// Layer 3 — Corpus Record Types
// ============================================================
// A corpus yields a stream of records, each either raw text or
// a pre-tokenized integer sequence. The first record pulled
// from a source fixes the mode for the lifetime of the
// pipeline — mixing modes mid-stream is a contract breach.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use serde::{Deserialize, Serialize};

/// One corpus item, immutable once read.
///
/// Untagged variant order matters: a row carrying both keys
/// counts as pre-tokenized, so `tokens` is tried first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    /// Already tokenised into integer token ids
    Tokens { tokens: Vec<u32> },

    /// Raw text that still needs tokenisation
    Text { text: String },
}

impl Record {
    /// Which mode this record belongs to
    pub fn mode(&self) -> RecordMode {
        match self {
            Record::Tokens { .. } => RecordMode::Tokenized,
            Record::Text { .. }   => RecordMode::Text,
        }
    }
}

/// The corpus mode, fixed by the first record pulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    Text,
    Tokenized,
}

/// A fixed-length sequence of token ids.
///
/// Every window holds exactly `context_size` tokens; a window
/// may contain parts of multiple records, separated by a single
/// boundary-marker (BOS) token wherever a record was split.
pub type TokenWindow = Vec<u32>;

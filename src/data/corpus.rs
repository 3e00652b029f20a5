// ============================================================
// Layer 4 — Corpus Sources
// ============================================================
// Streams records from a dataset for the window packer.
//
// The on-disk format is JSON Lines: one record per line, each
// either {"text": "..."} or {"tokens": [1, 2, 3]}. This is the
// row shape language-model datasets ship in, so a dump of any
// such dataset streams straight into the pipeline.
//
// Lines are read lazily — the whole corpus is never held in
// memory, which matters because sources may be effectively
// infinite.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §13 (Iterators)

use anyhow::Context;
use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::Path,
};

use crate::domain::error::StoreError;
use crate::domain::record::Record;
use crate::domain::traits::CorpusSource;

// ─── JsonlCorpus ──────────────────────────────────────────────────────────────
/// Streams records line-by-line from a .jsonl file.
pub struct JsonlCorpus {
    /// Kept for error messages and tracing
    path:  String,
    lines: Lines<BufReader<File>>,
    /// 1-based line number of the last line pulled
    line_no: usize,
}

impl JsonlCorpus {
    /// Open a corpus file for streaming.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open corpus '{}'", path.display()))?;

        tracing::info!("Streaming corpus from '{}'", path.display());

        Ok(Self {
            path:    path.display().to_string(),
            lines:   BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl CorpusSource for JsonlCorpus {
    fn next_record(&mut self) -> Result<Record, StoreError> {
        // Skip blank lines but never skip malformed ones —
        // a parse failure is a collaborator contract breach.
        loop {
            let line = match self.lines.next() {
                Some(line) => line,
                None       => return Err(StoreError::SourceExhausted),
            };
            self.line_no += 1;

            let line = line
                .with_context(|| format!("read error in '{}' line {}", self.path, self.line_no))?;

            if line.trim().is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(&line)
                .with_context(|| {
                    format!("malformed record in '{}' line {}", self.path, self.line_no)
                })?;

            return Ok(record);
        }
    }
}

// ─── MemoryCorpus ─────────────────────────────────────────────────────────────
/// Serves records from an in-memory Vec, front to back.
/// The workhorse source for unit tests and small experiments.
pub struct MemoryCorpus {
    records: std::vec::IntoIter<Record>,
}

impl MemoryCorpus {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records: records.into_iter() }
    }

    /// Convenience constructor for pre-tokenized records
    pub fn from_token_seqs(seqs: Vec<Vec<u32>>) -> Self {
        Self::new(
            seqs.into_iter()
                .map(|tokens| Record::Tokens { tokens })
                .collect(),
        )
    }
}

impl CorpusSource for MemoryCorpus {
    fn next_record(&mut self) -> Result<Record, StoreError> {
        self.records.next().ok_or(StoreError::SourceExhausted)
    }
}

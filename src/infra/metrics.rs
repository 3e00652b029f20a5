// ============================================================
// Layer 6 — Stream Metrics Logger
// ============================================================
// Records per-batch summary statistics of the served
// activations to a CSV file.
//
// Metrics recorded per training batch:
//   - batch:    running batch index (1, 2, 3, ...)
//   - records:  activation records in the batch
//   - mean:     mean activation value across the batch
//   - max_abs:  largest absolute activation value
//
// Output file: <dir>/activations.csv
//
// Example CSV output:
//   batch,records,mean,max_abs
//   1,64,0.001243,4.210938
//   2,64,-0.000587,3.978516
//   ...
//
// A drifting mean or an exploding max_abs is the first sign
// the corpus or the hooked model is misbehaving, long before a
// downstream training run fails.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics for a single served batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// Running batch index (starts at 1)
    pub batch: usize,

    /// Activation records in the batch
    pub records: usize,

    /// Mean activation value across every element of the batch
    pub mean: f64,

    /// Largest absolute activation value in the batch
    pub max_abs: f64,
}

impl BatchMetrics {
    pub fn new(batch: usize, records: usize, mean: f64, max_abs: f64) -> Self {
        Self { batch, records, mean, max_abs }
    }
}

/// Appends batch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("activations.csv");

        // Header only on a fresh file, so runs can append
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "batch,records,mean,max_abs")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one batch's metrics as a new row.
    pub fn log(&self, m: &BatchMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;

        writeln!(
            f,
            "{},{},{:.6},{:.6}",
            m.batch, m.records, m.mean, m.max_abs,
        )?;

        tracing::debug!(
            "Logged batch {}: mean={:.4}, max_abs={:.4}",
            m.batch, m.mean, m.max_abs,
        );

        Ok(())
    }

    /// Path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

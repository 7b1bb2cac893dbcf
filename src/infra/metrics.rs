// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to two CSV files:
//
//   metrics.csv — one row per epoch of every round
//     round,epoch,encoder_loss,recurrent_loss,encoder_dev_acc,recurrent_dev_acc
//
//   rounds.csv  — one row per self-training round
//     round,unlabeled,queued,accepted,pseudo_label_acc
//
// `pseudo_label_acc` is measured only on accepted rows whose
// unlabeled-pool marker is a real label; it is empty when no
// such row exists.
//
// How to read the metrics:
//   - Within a round, losses should fall and dev accuracy rise
//   - Across rounds, `unlabeled` shrinks by `accepted`
//   - A round with queued > 0 but accepted ≪ queued means one
//     class dominated the queue and the quota held it back
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const EPOCH_HEADER: &str = "round,epoch,encoder_loss,recurrent_loss,encoder_dev_acc,recurrent_dev_acc";
const ROUND_HEADER: &str = "round,unlabeled,queued,accepted,pseudo_label_acc";

/// One row of metrics.csv.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub round:             usize,
    pub epoch:             usize,
    pub encoder_loss:      f64,
    pub recurrent_loss:    f64,
    pub encoder_dev_acc:   f64,
    pub recurrent_dev_acc: f64,
}

/// One row of rounds.csv.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub round:            usize,
    /// Size of the unlabeled pool at the start of the round
    pub unlabeled:        usize,
    pub queued:           usize,
    pub accepted:         usize,
    pub pseudo_label_acc: Option<f64>,
}

/// Logs epoch and round metrics for later analysis.
pub struct MetricsLogger {
    epoch_path: PathBuf,
    round_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes each CSV header if its file doesn't exist yet.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let epoch_path = dir.join("metrics.csv");
        let round_path = dir.join("rounds.csv");
        write_header(&epoch_path, EPOCH_HEADER)?;
        write_header(&round_path, ROUND_HEADER)?;

        Ok(Self { epoch_path, round_path })
    }

    pub fn log_epoch(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = open_append(&self.epoch_path)?;
        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6}",
            m.round,
            m.epoch,
            m.encoder_loss,
            m.recurrent_loss,
            m.encoder_dev_acc,
            m.recurrent_dev_acc,
        )?;

        tracing::debug!(
            "Logged round {} epoch {} metrics: encoder_loss={:.4}, recurrent_loss={:.4}",
            m.round,
            m.epoch,
            m.encoder_loss,
            m.recurrent_loss,
        );
        Ok(())
    }

    pub fn log_round(&self, m: &RoundMetrics) -> Result<()> {
        let mut f   = open_append(&self.round_path)?;
        let acc     = m.pseudo_label_acc.map(|a| format!("{a:.6}")).unwrap_or_default();
        writeln!(f, "{},{},{},{},{}", m.round, m.unlabeled, m.queued, m.accepted, acc)?;
        Ok(())
    }

    pub fn epoch_path(&self) -> &Path {
        &self.epoch_path
    }

    pub fn round_path(&self) -> &Path {
        &self.round_path
    }
}

fn write_header(path: &Path, header: &str) -> Result<()> {
    // Only for new files, so reruns append to the same log
    if !path.exists() {
        let mut f = fs::File::create(path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        writeln!(f, "{header}")?;
        tracing::debug!("Created metrics CSV: '{}'", path.display());
    }
    Ok(())
}

fn open_append(path: &Path) -> Result<fs::File> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot append to '{}'", path.display()))
}

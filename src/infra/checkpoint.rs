// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores both classifiers using Burn's
// CompactRecorder, once per self-training round.
//
// What gets saved per round:
//   1. Encoder weights    (.mpk.gz)
//   2. Recurrent weights  (.mpk.gz)
//   3. latest_round.json  — which round was last saved
//
// And once per run:
//   self_train_config.json  — the run configuration
//   encoder_config.json     — encoder architecture
//   recurrent_config.json   — recurrent architecture
//
// The architecture files carry the vocabulary sizes and the
// embedding width actually used, which depend on the tokenizers
// and word vectors, so `evaluate` can rebuild both models
// exactly before loading weights into them.
//
// File naming convention:
//   checkpoints/
//     encoder_round_0.mpk.gz
//     recurrent_round_0.mpk.gz
//     ...
//     latest_round.json
//     self_train_config.json
//     encoder_config.json
//     recurrent_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::PathBuf};

use crate::application::self_train_use_case::SelfTrainConfig;

pub const ENCODER:   &str = "encoder";
pub const RECURRENT: &str = "recurrent";

const LATEST_ROUND_FILE: &str = "latest_round.json";
const RUN_CONFIG_FILE:   &str = "self_train_config.json";

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Save one model's weights for a round. `name` is ENCODER or RECURRENT.
    pub fn save_model<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        name:  &str,
        round: usize,
    ) -> Result<()> {
        // Recorder adds the extension
        let path = self.dir.join(format!("{name}_round_{round}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved {} checkpoint for round {}", name, round);
        Ok(())
    }

    /// Record `round` as the newest complete checkpoint.
    pub fn mark_round(&self, round: usize) -> Result<()> {
        let path = self.dir.join(LATEST_ROUND_FILE);
        fs::write(&path, serde_json::to_string(&round)?)
            .with_context(|| format!("Failed to write '{}'", path.display()))
    }

    /// Load a model's weights from the latest saved round.
    ///
    /// The model parameter must have the correct architecture
    /// (matching the saved checkpoint) or loading will fail.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        name:   &str,
        device: &B::Device,
    ) -> Result<M> {
        let round = self.latest_round()?;
        let path  = self.dir.join(format!("{name}_round_{round}"));

        tracing::info!("Loading {} checkpoint from round {}", name, round);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &SelfTrainConfig) -> Result<()> {
        self.save_json(RUN_CONFIG_FILE, cfg)
    }

    pub fn load_config(&self) -> Result<SelfTrainConfig> {
        self.load_json(RUN_CONFIG_FILE)
    }

    /// Save a model architecture config as `<name>_config.json`.
    pub fn save_model_config<C: Serialize>(&self, name: &str, cfg: &C) -> Result<()> {
        self.save_json(&format!("{name}_config.json"), cfg)
    }

    pub fn load_model_config<C: DeserializeOwned>(&self, name: &str) -> Result<C> {
        self.load_json(&format!("{name}_config.json"))
    }

    fn save_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        let path = self.dir.join(file_name);
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read '{}'. Make sure you have run 'train' before 'evaluate'.",
                    path.display()
                )
            })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))
    }

    /// Read latest_round.json and return the round number.
    /// Returns an error if no round has finished yet.
    fn latest_round(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_ROUND_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| "Cannot find 'latest_round.json'. Have you run 'train' first?")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::Classifier;
    use crate::ml::recurrent::{RecurrentClassifier, RecurrentClassifierConfig};
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray;

    #[test]
    fn test_model_round_trip_through_latest_round() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path().to_string_lossy().to_string()).unwrap();
        let device = Default::default();
        let cfg    = RecurrentClassifierConfig::new(12, 4, 3, 2);

        let model: RecurrentClassifier<TestBackend> = cfg.init(&device);
        ckpt.save_model_config(RECURRENT, &cfg).unwrap();
        ckpt.save_model(&model, RECURRENT, 0).unwrap();
        ckpt.mark_round(0).unwrap();

        let cfg: RecurrentClassifierConfig = ckpt.load_model_config(RECURRENT).unwrap();
        let fresh: RecurrentClassifier<TestBackend> = cfg.init(&device);
        let loaded = ckpt.load_model(fresh, RECURRENT, &device).unwrap();

        let ids = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 3]], &device);
        let a: Vec<f32> = model.embed_lookup(ids.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.embed_lookup(ids).into_data().to_vec().unwrap();
        // CompactRecorder stores half precision
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2);
        }
    }

    #[test]
    fn test_missing_round_marker_fails() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path().to_string_lossy().to_string()).unwrap();
        let device = Default::default();
        let model: RecurrentClassifier<TestBackend> =
            RecurrentClassifierConfig::new(12, 4, 3, 2).init(&device);
        assert!(ckpt.load_model(model, RECURRENT, &device).is_err());
    }
}

// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Scores the latest checkpointed classifiers on a labeled pool:
//   1. Load the run config saved by `train`
//   2. Reload both tokenizers and both architectures
//   3. Load the weights of the latest completed round
//   4. Report loss and accuracy for each classifier

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use std::fmt;

use crate::application::self_train_use_case::BackendKind;
use crate::data::{
    batcher::ClassificationBatcher,
    dataset::ClassificationDataset,
    pool::TsvPool,
    tokenization::TextEncoder,
};
use crate::domain::{example::LabeledExample, label_set::LabelSet};
use crate::infra::{
    checkpoint::{CheckpointManager, ENCODER, RECURRENT},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    inferencer::{evaluate, inference_loader, EvalStats},
    model::{EncoderClassifier, EncoderClassifierConfig},
    recurrent::{RecurrentClassifier, RecurrentClassifierConfig},
};

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub checkpoint_dir: String,
    pub file:           String,
    pub backend:        BackendKind,
    /// Falls back to the training batch size
    pub batch_size:     Option<usize>,
}

/// Loss and accuracy of both classifiers on one pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub encoder:   EvalStats,
    pub recurrent: EvalStats,
}

impl fmt::Display for PairScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluated {} examples", self.encoder.samples)?;
        writeln!(
            f,
            "  encoder   | loss={:.4} | acc={:.1}%",
            self.encoder.loss, self.encoder.accuracy * 100.0
        )?;
        write!(
            f,
            "  recurrent | loss={:.4} | acc={:.1}%",
            self.recurrent.loss, self.recurrent.accuracy * 100.0
        )
    }
}

/// Score both classifiers on `rows`. Models must already be in
/// evaluation mode (a non-autodiff backend).
pub fn score_pair<B: Backend>(
    encoder:        &EncoderClassifier<B>,
    recurrent:      &RecurrentClassifier<B>,
    encoder_text:   &TextEncoder,
    recurrent_text: &TextEncoder,
    rows:           &[LabeledExample],
    batch_size:     usize,
    device:         &B::Device,
) -> Result<PairScore> {
    let encoder_loader = inference_loader(
        ClassificationBatcher::<B>::new(device.clone()),
        ClassificationDataset::from_labeled(encoder_text, rows)?,
        batch_size,
    );
    let recurrent_loader = inference_loader(
        ClassificationBatcher::<B>::new(device.clone()).sorted_by_length(),
        ClassificationDataset::from_labeled(recurrent_text, rows)?,
        batch_size,
    );

    Ok(PairScore {
        encoder:   evaluate(encoder, &encoder_loader),
        recurrent: evaluate(recurrent, &recurrent_loader),
    })
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PairScore> {
        match self.config.backend {
            BackendKind::Gpu => self.run::<Wgpu>(WgpuDevice::default()),
            BackendKind::Cpu => self.run::<NdArray>(NdArrayDevice::Cpu),
        }
    }

    pub fn run<B: Backend>(&self, device: B::Device) -> Result<PairScore> {
        let ckpt = CheckpointManager::new(self.config.checkpoint_dir.clone())?;
        let run  = ckpt.load_config()?;

        let labels = LabelSet::parse(&run.labels)?;
        let rows   = TsvPool::new(&self.config.file).read_labeled(&labels)?;
        tracing::info!("Evaluating on {} rows from '{}'", rows.len(), self.config.file);

        let tok_store      = TokenizerStore::new(self.config.checkpoint_dir.clone());
        let encoder_text   = TextEncoder::for_encoder(tok_store.load_wordpiece()?, run.max_seq_len)?;
        let recurrent_text = TextEncoder::for_recurrent(tok_store.load_word_level()?, run.max_seq_len)?;

        let encoder_cfg: EncoderClassifierConfig     = ckpt.load_model_config(ENCODER)?;
        let recurrent_cfg: RecurrentClassifierConfig = ckpt.load_model_config(RECURRENT)?;

        let encoder   = ckpt.load_model(encoder_cfg.init::<B>(&device), ENCODER, &device)?;
        let recurrent = ckpt.load_model(recurrent_cfg.init::<B>(&device), RECURRENT, &device)?;

        score_pair(
            &encoder,
            &recurrent,
            &encoder_text,
            &recurrent_text,
            &rows,
            self.config.batch_size.unwrap_or(run.batch_size),
            &device,
        )
    }
}

// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Trains the classifier pair side by side, each with its own
// Adam optimiser and cross-entropy loss, on the same labeled
// pool. After every epoch both are evaluated on the dev pool.
//
//   for epoch in 1..=epochs
//       encoder   ← one pass over its loader (shuffled)
//       recurrent ← one pass over its loader (shuffled, rows
//                   length-sorted inside each batch)
//       evaluate both on dev (model.valid(), no dropout)
//
// Key Burn insight:
//   - Training runs on B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Dev batchers must also use B::InnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    batcher::{ClassificationBatch, ClassificationBatcher},
    dataset::ClassificationDataset,
};
use crate::ml::classifier::Classifier;
use crate::ml::inferencer::{evaluate, inference_loader};
use crate::ml::model::EncoderClassifier;
use crate::ml::recurrent::RecurrentClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainSettings {
    pub epochs:       usize,
    pub batch_size:   usize,
    pub seed:         u64,
    pub encoder_lr:   f64,
    pub recurrent_lr: f64,
}

/// Encoded pools for one round. Each classifier has its own
/// tokenizer, so each gets its own copy of the same rows.
pub struct PairData {
    pub encoder_train:   ClassificationDataset,
    pub encoder_dev:     ClassificationDataset,
    pub recurrent_train: ClassificationDataset,
    pub recurrent_dev:   ClassificationDataset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch:             usize,
    pub encoder_loss:      f64,
    pub recurrent_loss:    f64,
    pub encoder_dev_acc:   f64,
    pub recurrent_dev_acc: f64,
}

pub struct TrainedPair<B: AutodiffBackend> {
    pub encoder:   EncoderClassifier<B>,
    pub recurrent: RecurrentClassifier<B>,
}

pub fn train_pair<B, F>(
    pair:     TrainedPair<B>,
    data:     PairData,
    settings: &TrainSettings,
    device:   &B::Device,
    mut on_epoch: F,
) -> Result<TrainedPair<B>>
where
    B: AutodiffBackend,
    F: FnMut(&EpochReport) -> Result<()>,
{
    let TrainedPair { mut encoder, mut recurrent } = pair;

    // ── Adam optimisers ───────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut encoder_optim   = AdamConfig::new().with_epsilon(1e-8).init::<B, EncoderClassifier<B>>();
    let mut recurrent_optim = AdamConfig::new().with_epsilon(1e-8).init::<B, RecurrentClassifier<B>>();

    // ── Training data loaders (AutodiffBackend) ───────────────────────────────
    let encoder_loader = train_loader(
        ClassificationBatcher::<B>::new(device.clone()),
        data.encoder_train, settings,
    );
    let recurrent_loader = train_loader(
        ClassificationBatcher::<B>::new(device.clone()).sorted_by_length(),
        data.recurrent_train, settings,
    );

    // ── Dev data loaders (InnerBackend, no autodiff) ────────────────────────
    let encoder_dev = inference_loader(
        ClassificationBatcher::<B::InnerBackend>::new(device.clone()),
        data.encoder_dev, settings.batch_size,
    );
    let recurrent_dev = inference_loader(
        ClassificationBatcher::<B::InnerBackend>::new(device.clone()).sorted_by_length(),
        data.recurrent_dev, settings.batch_size,
    );

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=settings.epochs {
        let (next_encoder, encoder_loss) =
            train_epoch(encoder, &mut encoder_optim, &encoder_loader, settings.encoder_lr);
        encoder = next_encoder;

        let (next_recurrent, recurrent_loss) =
            train_epoch(recurrent, &mut recurrent_optim, &recurrent_loader, settings.recurrent_lr);
        recurrent = next_recurrent;

        // dropout disabled for deterministic evaluation
        let encoder_stats   = evaluate(&encoder.valid(), &encoder_dev);
        let recurrent_stats = evaluate(&recurrent.valid(), &recurrent_dev);

        let report = EpochReport {
            epoch,
            encoder_loss,
            recurrent_loss,
            encoder_dev_acc:   encoder_stats.accuracy,
            recurrent_dev_acc: recurrent_stats.accuracy,
        };

        println!(
            "Epoch {:>3}/{} | encoder_loss={:.4} | recurrent_loss={:.4} | encoder_dev={:.1}% | recurrent_dev={:.1}%",
            epoch, settings.epochs, encoder_loss, recurrent_loss,
            report.encoder_dev_acc * 100.0, report.recurrent_dev_acc * 100.0,
        );
        on_epoch(&report)?;
    }

    Ok(TrainedPair { encoder, recurrent })
}

fn train_loader<B: AutodiffBackend>(
    batcher:  ClassificationBatcher<B>,
    dataset:  ClassificationDataset,
    settings: &TrainSettings,
) -> Arc<dyn DataLoader<ClassificationBatch<B>>> {
    DataLoaderBuilder::new(batcher)
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(1)
        .build(dataset)
}

/// One optimisation pass; returns the updated model and its mean batch loss.
fn train_epoch<B, M, O>(
    mut model: M,
    optim:     &mut O,
    loader:    &Arc<dyn DataLoader<ClassificationBatch<B>>>,
    lr:        f64,
) -> (M, f64)
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B>,
    O: Optimizer<M, B>,
{
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;

    for batch in loader.iter() {
        let logits = model.classify(&batch).logits;
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, batch.labels);

        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
        loss_sum += loss_val;
        batches  += 1;

        // Backward pass + Adam update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);
    }

    let avg = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
    (model, avg)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ClassificationSample;
    use crate::ml::model::EncoderClassifierConfig;
    use crate::ml::recurrent::RecurrentClassifierConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn dataset() -> ClassificationDataset {
        let samples = (0..8)
            .map(|i| {
                let label = i % 2;
                let word  = if label == 0 { 5 } else { 6 };
                ClassificationSample {
                    example_index:  i,
                    input_ids:      vec![2, word, word, 3, 0, 0],
                    segment_ids:    vec![0; 6],
                    attention_mask: vec![1, 1, 1, 1, 0, 0],
                    label:          Some(label),
                    true_length:    4,
                }
            })
            .collect();
        ClassificationDataset::new(samples)
    }

    #[test]
    fn test_one_epoch_reports_finite_losses() {
        let device = Default::default();
        let pair = TrainedPair::<TestBackend> {
            encoder:   EncoderClassifierConfig::new(10, 6, 2, 8, 2, 1, 16, 0.0).init(&device),
            recurrent: RecurrentClassifierConfig::new(10, 4, 4, 2).init(&device),
        };
        let data = PairData {
            encoder_train:   dataset(),
            encoder_dev:     dataset(),
            recurrent_train: dataset(),
            recurrent_dev:   dataset(),
        };
        let settings = TrainSettings {
            epochs: 2, batch_size: 4, seed: 7, encoder_lr: 1e-3, recurrent_lr: 1e-3,
        };

        let mut reports = Vec::new();
        train_pair(pair, data, &settings, &device, |r| {
            reports.push(*r);
            Ok(())
        })
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].epoch, 2);
        assert!(reports.iter().all(|r| r.encoder_loss.is_finite() && r.recurrent_loss.is_finite()));
    }
}

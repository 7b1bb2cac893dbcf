// ============================================================
// Layer 5 — Inference Passes
// ============================================================
// Runs a classifier in evaluation mode over a whole pool.
//
//   predict   — one ExampleOutput per row (softmax
//               probabilities + attention over the real
//               tokens), returned in pool order
//   evaluate  — mean cross-entropy and accuracy on a labeled
//               pool
//
// Loaders here are never shuffled and every batch carries the
// example indices of its rows, so outputs are keyed by
// example whatever order the batcher puts rows in.

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::activation::softmax,
};
use std::sync::Arc;

use crate::data::{
    batcher::{ClassificationBatch, ClassificationBatcher},
    dataset::ClassificationDataset,
};
use crate::ml::classifier::Classifier;

/// What a classifier says about one pool row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExampleOutput {
    pub example_index: usize,
    pub probs:         Vec<f32>,
    /// Attention over the row's real tokens; empty when the model
    /// exposes none.
    pub attention:     Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalStats {
    pub loss:     f64,
    pub accuracy: f64,
    pub samples:  usize,
}

/// In-order loader for inference passes.
pub fn inference_loader<B: Backend>(
    batcher:    ClassificationBatcher<B>,
    dataset:    ClassificationDataset,
    batch_size: usize,
) -> Arc<dyn DataLoader<ClassificationBatch<B>>> {
    DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .num_workers(1)
        .build(dataset)
}

pub fn predict<B: Backend, M: Classifier<B>>(
    model:  &M,
    loader: &Arc<dyn DataLoader<ClassificationBatch<B>>>,
) -> Result<Vec<ExampleOutput>> {
    let mut outputs = Vec::new();

    for batch in loader.iter() {
        let output = model.classify(&batch);
        let [batch_size, n_classes] = output.logits.dims();

        let probs = tensor_to_vec(softmax(output.logits, 1))?;
        let attention = match output.attention {
            Some(a) => Some(tensor_to_vec(a)?),
            None    => None,
        };
        let seq_len = batch.input_ids.dims()[1];

        for row in 0..batch_size {
            let attention = attention
                .as_ref()
                .map(|a| a[row * seq_len..row * seq_len + batch.lengths[row]].to_vec())
                .unwrap_or_default();
            outputs.push(ExampleOutput {
                example_index: batch.example_indices[row],
                probs:         probs[row * n_classes..(row + 1) * n_classes].to_vec(),
                attention,
            });
        }
    }

    outputs.sort_by_key(|o| o.example_index);
    tracing::debug!("Predicted {} examples", outputs.len());
    Ok(outputs)
}

pub fn evaluate<B: Backend, M: Classifier<B>>(
    model:  &M,
    loader: &Arc<dyn DataLoader<ClassificationBatch<B>>>,
) -> EvalStats {
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;
    let mut correct  = 0usize;
    let mut samples  = 0usize;

    for batch in loader.iter() {
        let logits = model.classify(&batch).logits;
        let ce     = CrossEntropyLossConfig::new().init(&logits.device());

        let batch_loss: f64 = ce
            .forward(logits.clone(), batch.labels.clone())
            .into_scalar()
            .elem::<f64>();
        loss_sum += batch_loss;
        batches  += 1;

        // argmax(1) returns shape [batch, 1]; flatten to [batch]
        // before comparing with labels which is [batch]
        let predicted = logits.argmax(1).flatten::<1>(0, 1);
        let hits: i64 = predicted
            .equal(batch.labels)
            .int().sum().into_scalar().elem::<i64>();

        correct += hits as usize;
        samples += batch.example_indices.len();
    }

    EvalStats {
        loss:     if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
        accuracy: if samples > 0 { correct as f64 / samples as f64 } else { 0.0 },
        samples,
    }
}

fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

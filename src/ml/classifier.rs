// ============================================================
// Layer 5 — Classifier Contract
// ============================================================
// Both classifiers of the pair answer the same question: given
// a batch, produce per-class logits and (optionally) a
// per-timestep attention row. The trainer and the inference
// passes only ever talk to this trait, so they are written
// once for both models and for every backend.

use burn::prelude::*;

use crate::data::batcher::ClassificationBatch;

pub struct ClassifierOutput<B: Backend> {
    /// [batch, n_classes]
    pub logits: Tensor<B, 2>,

    /// [batch, seq_len], softmax over real tokens; `None` for models
    /// that do not expose attention.
    pub attention: Option<Tensor<B, 2>>,
}

pub trait Classifier<B: Backend> {
    fn classify(&self, batch: &ClassificationBatch<B>) -> ClassifierOutput<B>;

    /// Dense vectors for `ids`: [batch, seq_len] → [batch, seq_len, dim].
    fn embed_lookup(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3>;
}

/// `true` at padded positions, the shape burn's attention masks expect.
pub fn padding_mask<B: Backend>(attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2, Bool> {
    attention_mask.equal_elem(0)
}

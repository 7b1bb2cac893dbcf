// ============================================================
// Layer 5 — Attention-Recurrent Classifier
// ============================================================
// Word embeddings → LSTM → learned attention over time steps
// → ReLU → linear head.
//
//   h        = LSTM(embed(ids))                 [batch, seq, hidden]
//   score_t  = h_t · w                          [batch, seq]
//   α        = softmax(score) over real tokens  [batch, seq]
//   context  = Σ_t α_t · h_t                    [batch, hidden]
//   logits   = Linear(relu(context))            [batch, n_classes]
//
// `w` starts at zero, so the first forward pass attends evenly
// over the real tokens. α is what the lexicon miner reads.
//
// The embedding table can be seeded from pretrained word
// vectors; it is then frozen.
//
// Reference: Yang et al. (2016) Hierarchical Attention Networks
//            Burn Book §3 (Building Blocks)

use anyhow::{bail, Result};
use burn::{
    module::Param,
    nn::{
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig,
    },
    prelude::*,
    tensor::{
        activation::{relu, softmax},
        TensorData,
    },
};

use crate::data::batcher::ClassificationBatch;
use crate::infra::word_vectors::WordVectors;
use crate::ml::classifier::{padding_mask, Classifier, ClassifierOutput};

/// Score given to padded positions before the softmax.
const MASKED_SCORE: f32 = -1e9;

#[derive(Config, Debug)]
pub struct RecurrentClassifierConfig {
    pub vocab_size: usize,
    pub embed_dim:  usize,
    pub hidden_dim: usize,
    pub n_classes:  usize,
}

impl RecurrentClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RecurrentClassifier<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embed_dim).init(device);
        let lstm      = LstmConfig::new(self.embed_dim, self.hidden_dim, true).init(device);
        let attention = Param::from_tensor(Tensor::zeros([self.hidden_dim], device));
        let head      = LinearConfig::new(self.hidden_dim, self.n_classes).init(device);
        RecurrentClassifier { embedding, lstm, attention, head }
    }

    /// Same model with a frozen embedding table taken from `vectors`.
    pub fn init_with_embeddings<B: Backend>(
        &self,
        vectors: &WordVectors,
        device:  &B::Device,
    ) -> Result<RecurrentClassifier<B>> {
        if vectors.rows() != self.vocab_size || vectors.dim != self.embed_dim {
            bail!(
                "word vectors are {}×{} but the classifier expects {}×{}",
                vectors.rows(), vectors.dim, self.vocab_size, self.embed_dim
            );
        }
        let mut model = self.init(device);
        let weight = Tensor::<B, 2>::from_data(
            TensorData::new(vectors.weights.clone(), [vectors.rows(), vectors.dim]),
            device,
        );
        model.embedding.weight = Param::from_tensor(weight).set_require_grad(false);
        Ok(model)
    }
}

#[derive(Module, Debug)]
pub struct RecurrentClassifier<B: Backend> {
    pub embedding: Embedding<B>,
    pub lstm:      Lstm<B>,
    pub attention: Param<Tensor<B, 1>>,
    pub head:      Linear<B>,
}

pub struct RecurrentOutput<B: Backend> {
    pub logits:    Tensor<B, 2>,
    pub attention: Tensor<B, 2>,
}

impl<B: Backend> RecurrentClassifier<B> {
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> RecurrentOutput<B> {
        let [batch_size, seq_len] = input_ids.dims();

        let x = self.embedding.forward(input_ids);
        let (hidden, _) = self.lstm.forward(x, None); // [batch, seq, hidden]
        let [_, _, hidden_dim] = hidden.dims();

        // ── Attention weights ─────────────────────────────────────────────────
        let w      = self.attention.val().reshape([1, 1, hidden_dim]);
        let scores = (hidden.clone() * w)
            .sum_dim(2)
            .reshape([batch_size, seq_len])
            .mask_fill(padding_mask(attention_mask), MASKED_SCORE);
        let attention = softmax(scores, 1);

        // ── Weighted sum of hidden states ─────────────────────────────────────
        let context = (hidden * attention.clone().reshape([batch_size, seq_len, 1]))
            .sum_dim(1)
            .reshape([batch_size, hidden_dim]);

        let logits = self.head.forward(relu(context));
        RecurrentOutput { logits, attention }
    }
}

impl<B: Backend> Classifier<B> for RecurrentClassifier<B> {
    fn classify(&self, batch: &ClassificationBatch<B>) -> ClassifierOutput<B> {
        let output = self.forward(batch.input_ids.clone(), batch.attention_mask.clone());
        ClassifierOutput { logits: output.logits, attention: Some(output.attention) }
    }

    fn embed_lookup(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.embedding.forward(ids)
    }
}

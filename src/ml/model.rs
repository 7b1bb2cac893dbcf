// ============================================================
// Layer 5 — Encoder Classifier
// ============================================================
// A small BERT-style encoder with a sequence classification
// head:
//
//   token emb + segment emb + position emb
//       → dropout
//       → N × EncoderBlock (self-attention, padding masked)
//       → final LayerNorm
//       → pooled first position ([CLS])
//       → Linear(d, d) → tanh → dropout → Linear(d, n_classes)
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Devlin et al. (2019) BERT
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, tanh},
};

use crate::data::batcher::ClassificationBatch;
use crate::ml::classifier::{padding_mask, Classifier, ClassifierOutput};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally. Adding them again gives conflicting impls.
#[derive(Config, Debug)]
pub struct EncoderClassifierConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub n_classes:   usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl EncoderClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderClassifier<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let segment_embedding  = EmbeddingConfig::new(2, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let pooler     = LinearConfig::new(self.d_model, self.d_model).init(device);
        let head       = LinearConfig::new(self.d_model, self.n_classes).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        EncoderClassifier {
            token_embedding, segment_embedding, position_embedding, layers,
            final_norm, pooler, head, dropout,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad`: [batch, seq_len], true at padded positions.
    pub fn forward(&self, x: Tensor<B, 3>, pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let input       = MhaInput::self_attn(x.clone()).mask_pad(pad);
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct EncoderClassifier<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub segment_embedding:  Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub pooler:             Linear<B>,
    pub head:               Linear<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> EncoderClassifier<B> {
    /// input_ids, segment_ids, attention_mask: [batch, seq_len] → logits [batch, n_classes]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        segment_ids:    Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);
        let seg_emb = self.segment_embedding.forward(segment_ids);

        // Learned absolute positions
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let pad   = padding_mask(attention_mask);
        let mut x = self.dropout.forward(tok_emb + seg_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, pad.clone());
        }
        let x = self.final_norm.forward(x); // [batch, seq_len, d_model]
        let [_, _, d_model] = x.dims();

        // Pool the [CLS] position
        let pooled = x
            .slice([0..batch_size, 0..1, 0..d_model])
            .reshape([batch_size, d_model]);
        let pooled = self.dropout.forward(tanh(self.pooler.forward(pooled)));

        self.head.forward(pooled)
    }
}

impl<B: Backend> Classifier<B> for EncoderClassifier<B> {
    fn classify(&self, batch: &ClassificationBatch<B>) -> ClassifierOutput<B> {
        let logits = self.forward(
            batch.input_ids.clone(),
            batch.segment_ids.clone(),
            batch.attention_mask.clone(),
        );
        ClassifierOutput { logits, attention: None }
    }

    fn embed_lookup(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.token_embedding.forward(ids)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config() -> EncoderClassifierConfig {
        EncoderClassifierConfig::new(30, 8, 3, 16, 2, 1, 32, 0.0)
    }

    #[test]
    fn test_logits_shape() {
        let device = Default::default();
        let model: EncoderClassifier<TestBackend> = config().init(&device);

        let ids  = Tensor::<TestBackend, 2, Int>::from_ints([[2, 5, 6, 3, 0, 0, 0, 0], [2, 7, 3, 0, 0, 0, 0, 0]], &device);
        let segs = Tensor::<TestBackend, 2, Int>::zeros([2, 8], &device);
        let mask = Tensor::<TestBackend, 2, Int>::from_ints([[1, 1, 1, 1, 0, 0, 0, 0], [1, 1, 1, 0, 0, 0, 0, 0]], &device);

        let logits = model.forward(ids, segs, mask);
        assert_eq!(logits.dims(), [2, 3]);
    }

    #[test]
    fn test_padding_does_not_change_prediction() {
        let device = Default::default();
        let model: EncoderClassifier<TestBackend> = config().init(&device);

        // Same real tokens, different garbage in the padded tail
        let mask = Tensor::<TestBackend, 2, Int>::from_ints([[1, 1, 1, 0, 0, 0, 0, 0]], &device);
        let segs = Tensor::<TestBackend, 2, Int>::zeros([1, 8], &device);
        let a = Tensor::<TestBackend, 2, Int>::from_ints([[2, 9, 3, 0, 0, 0, 0, 0]], &device);
        let b = Tensor::<TestBackend, 2, Int>::from_ints([[2, 9, 3, 4, 4, 4, 4, 4]], &device);

        let la: Vec<f32> = model.forward(a, segs.clone(), mask.clone()).into_data().to_vec().unwrap();
        let lb: Vec<f32> = model.forward(b, segs, mask).into_data().to_vec().unwrap();
        for (x, y) in la.iter().zip(&lb) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}

// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn model, training and inference
// code. Domain logic never sees a tensor: it receives plain
// probability and attention vectors from the inference passes.
//
// What's in this layer:
//
//   classifier.rs — The contract both classifiers implement
//                   (logits + optional attention per batch)
//
//   model.rs      — The transformer encoder classifier:
//                   • Token, segment and position embeddings
//                   • Multi-head self-attention with padding mask
//                   • Feed-forward networks (GELU activation)
//                   • Pooled [CLS] → tanh → linear head
//
//   recurrent.rs  — The attention-recurrent classifier:
//                   embedding → LSTM → attention → linear head
//
//   trainer.rs    — Trains both classifiers on a labeled pool,
//                   evaluating on dev after each epoch
//
//   inferencer.rs — In-order prediction and evaluation passes
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Devlin et al. (2019) BERT

/// Shared classifier trait and output type
pub mod classifier;

/// Transformer encoder classifier
pub mod model;

/// Attention-recurrent classifier
pub mod recurrent;

/// Training loop for the classifier pair
pub mod trainer;

/// Prediction and evaluation passes
pub mod inferencer;

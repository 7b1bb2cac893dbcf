// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-backed collaborators of the self-training loop:
//
//   checkpoint.rs      — Saving and loading model weights
//                        Uses Burn's CompactRecorder for both
//                        classifiers, plus the run config and
//                        the two architecture configs as JSON
//                        so `evaluate` can rebuild the models.
//
//   tokenizer_store.rs — Tokenizer persistence
//                        Builds the WordPiece and WordLevel
//                        tokenizers once, then reloads them so
//                        every round and every later command
//                        sees the same vocabulary.
//
//   word_vectors.rs    — Pretrained word vectors (text format)
//                        for the recurrent classifier's
//                        embedding table.
//
//   lexicon_store.rs   — Per-class lexicon files, rewritten
//                        each round.
//
//   metrics.rs         — Epoch and round metrics CSV files.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Word2vec-format vector reader
pub mod word_vectors;

/// Lexicon file persistence
pub mod lexicon_store;

/// Training metrics CSV logger
pub mod metrics;

// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from pool files on disk all
// the way to tensor batches.
//
// The pipeline flows in this order:
//
//   total pool .tsv
//       │
//       ▼
//   split_pool        → class-balanced dev / labeled / unlabeled
//       │
//       ▼
//   TsvPool           → reads and rewrites label<TAB>text files
//       │
//       ▼
//   Preprocessor      → cleans text into one normalised line
//       │
//       ▼
//   TextEncoder       → token ids, segments, mask, true length
//       │
//       ▼
//   ClassificationDataset → implements Burn's Dataset trait
//       │
//       ▼
//   ClassificationBatcher → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to training and inference
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads and writes TSV pool files
pub mod pool;

/// Cleans raw text and shapes token sequences
pub mod preprocessor;

/// Encodes text into padded samples for either classifier
pub mod tokenization;

/// Implements Burn's Dataset trait for classification samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded class-balanced split of a total pool
pub mod splitter;

// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// The self-training engine itself: pure Rust structs, enums
// and functions that decide which unlabeled examples become
// training data.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O (pools and lexicons arrive through traits)
//   - Only plain Rust structs, enums, traits and functions
//
// Round flow through this layer:
//
//   RoundState::reset        ← fresh unlabeled pool
//       │
//       ▼
//   LexiconMiner::observe    ← recurrent attention + probs
//       │
//       ▼
//   LexiconMiner::finalize   → Lexicon (top 50 per class)
//       │
//       ▼
//   PseudoLabeler::label     ← lexicon + both predictions
//       │
//       ▼
//   rebalance                → AcceptanceRecord
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Domain error type (thiserror)
pub mod error;

// Ordered label strings ↔ class ids
pub mod label_set;

// Pool rows and examples
pub mod example;

// Classifier predictions and provisional assignments
pub mod assignment;

// Keyword-phrase matching against a class lexicon
pub mod matching;

// Attention-driven lexicon mining
pub mod lexicon;

// Lexicon + confidence pseudo-labeling rules
pub mod pseudo_label;

// Class-balanced acceptance of provisional labels
pub mod rebalance;

// Per-round mutable state
pub mod round_state;

// Core abstractions (traits) that other layers implement
pub mod traits;

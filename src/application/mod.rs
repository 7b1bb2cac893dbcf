// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one command (split, train or evaluate).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - No direct file formats (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Split a total pool into dev / labeled / unlabeled files
pub mod split_use_case;

// One self-training round over pre-computed classifier outputs
pub mod round_engine;

// The self-training workflow
pub mod self_train_use_case;

// Scoring saved checkpoints on a labeled file
pub mod evaluate_use_case;

// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Typed failures raised by the domain and data layers.
// Everything above this layer wraps them in anyhow::Error
// with extra context, so callers can still downcast when
// they need to tell an unknown label from a broken file.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelfTrainError {
    /// A pool row carries a label outside the configured label set.
    #[error("unknown label '{label}' on row {row} (expected one of: {expected})")]
    UnknownLabel {
        label:    String,
        row:      usize,
        expected: String,
    },

    /// A pool row could not be split into label and text.
    #[error("malformed row {row} in '{path}': {reason}")]
    MalformedRow {
        path:   String,
        row:    usize,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

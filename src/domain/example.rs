use serde::{Deserialize, Serialize};

use crate::domain::error::SelfTrainError;
use crate::domain::label_set::{ClassId, LabelSet};

/// First-column value for unlabeled rows that carry no gold label.
pub const NO_GOLD_MARKER: &str = "-1";

/// One raw `label<TAB>text` line of a pool file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRow {
    pub marker: String,
    pub text:   String,
}

impl PoolRow {
    pub fn new(marker: impl Into<String>, text: impl Into<String>) -> Self {
        Self { marker: marker.into(), text: text.into() }
    }
}

/// A row of the labeled (or dev / test) pool with its class resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExample {
    pub index: usize,
    pub label: ClassId,
    pub text:  String,
}

/// An unlabeled-pool row. `index` is the row's position in the file
/// and stays attached to it through preprocessing and batching.
/// `marker` is written back unchanged when the row stays unlabeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub index:      usize,
    pub text:       String,
    pub marker:     String,
    pub gold_label: Option<ClassId>,
}

impl LabeledExample {
    /// Resolve every row's label; the first unknown label aborts.
    pub fn from_rows(rows: &[PoolRow], labels: &LabelSet) -> Result<Vec<Self>, SelfTrainError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                Ok(Self {
                    index,
                    label: labels.class_id(&row.marker, index + 1)?,
                    text:  row.text.clone(),
                })
            })
            .collect()
    }
}

impl Example {
    /// Unlabeled rows keep their marker. A marker that is a known label
    /// becomes the gold label (used for reporting only); `-1` means no
    /// gold label; anything else is an unknown label.
    pub fn from_rows(rows: &[PoolRow], labels: &LabelSet) -> Result<Vec<Self>, SelfTrainError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let gold_label = if row.marker.trim() == NO_GOLD_MARKER {
                    None
                } else {
                    Some(labels.class_id(&row.marker, index + 1)?)
                };
                Ok(Self {
                    index,
                    text:   row.text.clone(),
                    marker: row.marker.clone(),
                    gold_label,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlabeled_rows_keep_marker_and_index() {
        let labels = LabelSet::numeric(3).unwrap();
        let rows   = vec![PoolRow::new("2", "alpha"), PoolRow::new("-1", "beta")];
        let ex     = Example::from_rows(&rows, &labels).unwrap();
        assert_eq!(ex[0].gold_label, Some(2));
        assert_eq!(ex[1].gold_label, None);
        assert_eq!(ex[1].index, 1);
        assert_eq!(ex[1].marker, "-1");
    }

    #[test]
    fn test_labeled_rows_reject_unknown_label() {
        let labels = LabelSet::numeric(2).unwrap();
        let rows   = vec![PoolRow::new("0", "ok"), PoolRow::new("5", "bad")];
        let err    = LabeledExample::from_rows(&rows, &labels).unwrap_err();
        assert!(matches!(err, SelfTrainError::UnknownLabel { row: 2, .. }));
    }
}

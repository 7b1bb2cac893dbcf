use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::Preprocessor;
use crate::data::tokenization::TextEncoder;
use crate::domain::example::{Example, LabeledExample};

/// One tokenised and padded example.
/// `example_index` is the row's position in its pool file and is
/// carried all the way to the batch so predictions can be keyed
/// back to the example without position arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationSample {
    pub example_index:  usize,
    pub input_ids:      Vec<u32>,
    pub segment_ids:    Vec<u32>,
    pub attention_mask: Vec<u32>,
    /// None for unlabeled rows without a gold label.
    pub label:          Option<usize>,
    pub true_length:    usize,
}

pub struct ClassificationDataset {
    samples: Vec<ClassificationSample>,
}

impl ClassificationDataset {
    pub fn new(samples: Vec<ClassificationSample>) -> Self { Self { samples } }

    /// Encode a labeled (or dev / test) pool.
    pub fn from_labeled(encoder: &TextEncoder, rows: &[LabeledExample]) -> Result<Self> {
        let pre = Preprocessor::new();
        rows.iter()
            .map(|row| {
                encoder
                    .encode(row.index, &pre.clean(&row.text), None, Some(row.label))
                    .with_context(|| format!("Cannot encode labeled row {}", row.index + 1))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// Encode an unlabeled pool; gold labels ride along when present.
    pub fn from_unlabeled(encoder: &TextEncoder, rows: &[Example]) -> Result<Self> {
        let pre = Preprocessor::new();
        rows.iter()
            .map(|row| {
                encoder
                    .encode(row.index, &pre.clean(&row.text), None, row.gold_label)
                    .with_context(|| format!("Cannot encode unlabeled row {}", row.index + 1))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }
}

impl Dataset<ClassificationSample> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<ClassificationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;
    use tempfile::tempdir;

    #[test]
    fn test_unlabeled_dataset_keeps_indices_and_gold() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        let texts = vec!["quiet river town".to_string(), "loud city\tnight".to_string()];
        let tok   = store.build_word_level(&texts, None, 100).unwrap();
        let enc   = TextEncoder::for_recurrent(tok, 8).unwrap();

        let rows = vec![
            Example { index: 0, text: texts[0].clone(), marker: "-1".into(), gold_label: None },
            Example { index: 1, text: texts[1].clone(), marker: "1".into(),  gold_label: Some(1) },
        ];
        let ds = ClassificationDataset::from_unlabeled(&enc, &rows).unwrap();
        assert_eq!(ds.len(), 2);

        let second = ds.get(1).unwrap();
        assert_eq!(second.example_index, 1);
        assert_eq!(second.label, Some(1));
        assert_eq!(second.true_length, 3);
        assert_eq!(ds.get(0).unwrap().label, None);
    }
}

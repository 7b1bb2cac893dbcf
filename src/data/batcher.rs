// ============================================================
// Layer 4 — Classification Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a
// Vec<ClassificationSample> into tensors.
//
// How batching works here:
//   Input:  Vec of N samples, each padded to length S
//   Output: ClassificationBatch with tensors of shape [N, S]
//
//   We flatten all input_ids into one long Vec, then reshape:
//   [s1_t1, s1_t2, ..., s1_tS, s2_t1, ..., sN_tS] → [N, S]
//
// The recurrent classifier wants its batch ordered by true
// length, longest first. `sorted_by_length()` turns that on;
// the reordering is stable and every row keeps its example
// index, so results are always keyed by example, never by
// batch position.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ClassificationSample;

// ─── ClassificationBatch ──────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// Token ids — [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// Segment ids — [batch_size, seq_len], 0 for text a, 1 for text b
    pub segment_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Class ids — [batch_size]; rows without a label carry 0
    pub labels: Tensor<B, 1, Int>,

    /// Unpadded length of every row
    pub lengths: Vec<usize>,

    /// Pool position of every row
    pub example_indices: Vec<usize>,

    /// Which rows have a real label
    pub has_label: Vec<bool>,
}

// ─── ClassificationBatcher ────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    /// The device to create tensors on
    pub device: B::Device,

    /// Order rows by descending true length
    pub sort_by_length: bool,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device, sort_by_length: false }
    }

    pub fn sorted_by_length(mut self) -> Self {
        self.sort_by_length = true;
        self
    }
}

impl<B: Backend> Batcher<ClassificationSample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, mut items: Vec<ClassificationSample>) -> ClassificationBatch<B> {
        if self.sort_by_length {
            items.sort_by(|a, b| b.true_length.cmp(&a.true_length));
        }

        let batch_size = items.len();
        // All sequences have the same length (pre-padded)
        let seq_len = items.first().map_or(0, |s| s.input_ids.len());

        // ── Flatten the sequence fields ───────────────────────────────────────
        // Vec<Vec<u32>> → Vec<i32> (Burn uses i32 for Int tensor input)
        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();

        let segment_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.segment_ids.iter().map(|&x| x as i32))
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.attention_mask.iter().map(|&x| x as i32))
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .map(|s| s.label.unwrap_or(0) as i32)
            .collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let input_ids = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let segment_ids = Tensor::<B, 1, Int>::from_ints(
            segment_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let attention_mask = Tensor::<B, 1, Int>::from_ints(
            mask_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ClassificationBatch {
            input_ids,
            segment_ids,
            attention_mask,
            labels,
            lengths:         items.iter().map(|s| s.true_length).collect(),
            example_indices: items.iter().map(|s| s.example_index).collect(),
            has_label:       items.iter().map(|s| s.label.is_some()).collect(),
        }
    }
}

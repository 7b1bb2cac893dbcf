// ============================================================
// Layer 4 — Class-Balanced Pool Splitter
// ============================================================
// Shuffles the total pool with a fixed seed and deals rows out
// per class into three pools:
//
//   dev        — first `dev_per_class` rows of each class
//   labeled    — next `labeled_per_class` rows
//   unlabeled  — up to `unlabeled_per_class` more rows
//
// Rows beyond the three quotas are dropped. Keeping the quotas
// per class means every pool starts class-balanced no matter
// how the source file is ordered.
//
// Default quotas for N rows and k classes:
//   holdout   = max(2, ⌊N·0.01 / k⌋)
//   dev       = max(1, ⌊holdout·0.15⌋)
//   labeled   = holdout − dev
//   unlabeled = ⌊(N − holdout·k) / k⌋
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom on a
// seeded ChaCha8 generator so the split is reproducible.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::domain::error::SelfTrainError;
use crate::domain::example::LabeledExample;

/// Rows per class for each output pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub dev_per_class:       usize,
    pub labeled_per_class:   usize,
    pub unlabeled_per_class: usize,
}

impl SplitPlan {
    /// Default proportions for `total` rows over `n_classes` classes.
    pub fn proportional(total: usize, n_classes: usize) -> Result<Self, SelfTrainError> {
        if n_classes == 0 {
            return Err(SelfTrainError::InvalidConfig("cannot split into zero classes".into()));
        }
        let holdout   = ((total as f64 * 0.01) / n_classes as f64).floor() as usize;
        let holdout   = holdout.max(2);
        let dev       = ((holdout as f64 * 0.15).floor() as usize).max(1);
        let labeled   = holdout - dev;
        let unlabeled = total.saturating_sub(holdout * n_classes) / n_classes;
        Ok(Self {
            dev_per_class:       dev,
            labeled_per_class:   labeled,
            unlabeled_per_class: unlabeled,
        })
    }

    /// Replace individual quotas with explicit values.
    pub fn with_overrides(
        mut self,
        dev:       Option<usize>,
        labeled:   Option<usize>,
        unlabeled: Option<usize>,
    ) -> Self {
        if let Some(d) = dev       { self.dev_per_class       = d; }
        if let Some(l) = labeled   { self.labeled_per_class   = l; }
        if let Some(u) = unlabeled { self.unlabeled_per_class = u; }
        self
    }
}

/// The three pools produced by a split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSplit {
    pub dev:       Vec<LabeledExample>,
    pub labeled:   Vec<LabeledExample>,
    pub unlabeled: Vec<LabeledExample>,
}

/// Shuffle `rows` with `seed` and deal them out per class.
pub fn split_pool(
    mut rows:  Vec<LabeledExample>,
    n_classes: usize,
    plan:      &SplitPlan,
    seed:      u64,
) -> PoolSplit {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    // Fisher-Yates shuffle, every permutation equally likely
    rows.shuffle(&mut rng);

    let mut taken = vec![0usize; n_classes];
    let mut split = PoolSplit::default();
    let dev_end       = plan.dev_per_class;
    let labeled_end   = dev_end + plan.labeled_per_class;
    let unlabeled_end = labeled_end + plan.unlabeled_per_class;

    for row in rows {
        let Some(count) = taken.get_mut(row.label) else { continue };
        let slot = *count;
        *count += 1;

        if slot < dev_end {
            split.dev.push(row);
        } else if slot < labeled_end {
            split.labeled.push(row);
        } else if slot < unlabeled_end {
            split.unlabeled.push(row);
        }
    }

    tracing::debug!(
        "Pool split: {} dev, {} labeled, {} unlabeled",
        split.dev.len(),
        split.labeled.len(),
        split.unlabeled.len(),
    );

    split
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize, k: usize) -> Vec<LabeledExample> {
        (0..n)
            .map(|i| LabeledExample { index: i, label: i % k, text: format!("row {i}") })
            .collect()
    }

    #[test]
    fn test_proportional_plan() {
        // 14 000 rows, 14 classes → 10 held out per class
        let plan = SplitPlan::proportional(14_000, 14).unwrap();
        assert_eq!(plan.dev_per_class, 1);
        assert_eq!(plan.labeled_per_class, 9);
        assert_eq!(plan.unlabeled_per_class, 990);
    }

    #[test]
    fn test_small_pool_still_gets_dev_and_labeled() {
        let plan = SplitPlan::proportional(40, 4).unwrap();
        assert_eq!(plan.dev_per_class, 1);
        assert_eq!(plan.labeled_per_class, 1);
        assert_eq!(plan.unlabeled_per_class, 8);
    }

    #[test]
    fn test_split_is_class_balanced() {
        let plan  = SplitPlan { dev_per_class: 2, labeled_per_class: 3, unlabeled_per_class: 5 };
        let split = split_pool(rows(100, 4), 4, &plan, 42);
        assert_eq!(split.dev.len(), 8);
        assert_eq!(split.labeled.len(), 12);
        assert_eq!(split.unlabeled.len(), 20);
        for class in 0..4 {
            assert_eq!(split.labeled.iter().filter(|r| r.label == class).count(), 3);
        }
    }

    #[test]
    fn test_no_row_lands_in_two_pools() {
        let plan  = SplitPlan { dev_per_class: 1, labeled_per_class: 1, unlabeled_per_class: 100 };
        let split = split_pool(rows(30, 3), 3, &plan, 1);
        let mut seen: Vec<usize> = split.dev.iter()
            .chain(&split.labeled)
            .chain(&split.unlabeled)
            .map(|r| r.index)
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn test_same_seed_same_split() {
        let plan = SplitPlan { dev_per_class: 1, labeled_per_class: 2, unlabeled_per_class: 3 };
        let a = split_pool(rows(50, 5), 5, &plan, 9);
        let b = split_pool(rows(50, 5), 5, &plan, 9);
        assert_eq!(a, b);
    }

    #[test]
    fn test_overrides() {
        let plan = SplitPlan::proportional(1000, 2).unwrap().with_overrides(Some(4), None, Some(10));
        assert_eq!(plan.dev_per_class, 4);
        assert_eq!(plan.unlabeled_per_class, 10);
    }

    #[test]
    fn test_zero_classes_rejected() {
        assert!(SplitPlan::proportional(10, 0).is_err());
    }
}

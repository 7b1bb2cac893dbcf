// ============================================================
// Layer 3 — Pool Rebalancer
// ============================================================
// Decides which provisional labels are accepted into the
// labeled pool at the end of a round.
//
//   quota a = smallest queue tally among classes that were
//             assigned at least once (0 → nothing accepted)
//
//   shuffle the queued assignments with the round RNG, then
//   accept (example, class) while class has < a acceptances
//   and the example has not been accepted yet
//
// So every class that received any provisional label ends the
// round with exactly `a` new training examples.
//
// AcceptanceRecord holds the per-example outcome and renders
// the two files written back at round end:
//   accepted → (resolved label, text) appended to labeled pool
//   pending  → (original marker, text) = next unlabeled pool

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::example::{Example, PoolRow};
use crate::domain::label_set::{ClassId, LabelSet};
use crate::domain::round_state::RoundState;

// ─── AcceptanceRecord ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceEntry {
    pub accepted:       bool,
    pub resolved_label: Option<ClassId>,
    pub text:           String,
    pub marker:         String,
}

/// Per-example acceptance bookkeeping for one round, keyed by example index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptanceRecord {
    entries: BTreeMap<usize, AcceptanceEntry>,
}

impl AcceptanceRecord {
    pub fn from_examples(examples: &[Example]) -> Self {
        let entries = examples
            .iter()
            .map(|ex| {
                (
                    ex.index,
                    AcceptanceEntry {
                        accepted:       false,
                        resolved_label: None,
                        text:           ex.text.clone(),
                        marker:         ex.marker.clone(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, example_index: usize) -> Option<&AcceptanceEntry> {
        self.entries.get(&example_index)
    }

    /// Flip an example to accepted with `label`.
    /// Returns false for unknown or already accepted examples.
    pub fn accept(&mut self, example_index: usize, label: ClassId) -> bool {
        match self.entries.get_mut(&example_index) {
            Some(entry) if !entry.accepted => {
                entry.accepted       = true;
                entry.resolved_label = Some(label);
                true
            }
            _ => false,
        }
    }

    pub fn accepted_count(&self) -> usize {
        self.entries.values().filter(|e| e.accepted).count()
    }

    /// Rows to append to the labeled pool, in example order.
    pub fn accepted_rows(&self, labels: &LabelSet) -> Vec<PoolRow> {
        self.entries
            .values()
            .filter(|e| e.accepted)
            .filter_map(|e| e.resolved_label.map(|l| PoolRow::new(labels.name(l), e.text.clone())))
            .collect()
    }

    /// Rows that form the next unlabeled pool, in example order.
    pub fn pending_rows(&self) -> Vec<PoolRow> {
        self.entries
            .values()
            .filter(|e| !e.accepted)
            .map(|e| PoolRow::new(e.marker.clone(), e.text.clone()))
            .collect()
    }

    /// Share of accepted rows whose marker names the same class they
    /// were accepted under. Rows with no gold marker are skipped;
    /// None when no accepted row has one.
    pub fn gold_agreement(&self, labels: &LabelSet) -> Option<f64> {
        let (hits, total) = self
            .entries
            .values()
            .filter(|e| e.accepted)
            .filter_map(|e| labels.lookup(e.marker.trim()).map(|gold| Some(gold) == e.resolved_label))
            .fold((0usize, 0usize), |(h, t), hit| (h + usize::from(hit), t + 1));
        (total > 0).then(|| hits as f64 / total as f64)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ─── Rebalancing ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceOutcome {
    /// Per-class acceptance cap (`a`); 0 when nothing was queued.
    pub quota:              usize,
    pub queued:             usize,
    pub accepted:           usize,
    pub accepted_per_class: Vec<usize>,
}

impl RebalanceOutcome {
    pub fn is_starved(&self) -> bool {
        self.quota == 0
    }
}

/// Smallest non-zero tally, or 0 when every tally is zero.
pub fn acceptance_quota(queue_tally: &[usize]) -> usize {
    queue_tally.iter().copied().filter(|&c| c > 0).min().unwrap_or(0)
}

/// Accept a class-balanced subset of the round's queued assignments.
pub fn rebalance<R: Rng + ?Sized>(state: &mut RoundState, rng: &mut R) -> RebalanceOutcome {
    let n_classes = state.n_classes();
    let quota     = acceptance_quota(state.queue_tally());

    let mut queue: Vec<(usize, ClassId)> = state
        .queued()
        .filter_map(|a| a.label.map(|label| (a.example_index, label)))
        .collect();
    let queued = queue.len();
    queue.shuffle(rng);

    let mut accepted_per_class = vec![0usize; n_classes];
    if quota > 0 {
        let record = state.acceptance_mut();
        for (example_index, class) in queue {
            let Some(count) = accepted_per_class.get_mut(class) else { continue };
            if *count >= quota {
                continue;
            }
            if record.accept(example_index, class) {
                *count += 1;
            }
        }
    }

    let accepted = accepted_per_class.iter().sum();
    tracing::debug!(
        "Rebalanced round {}: quota={}, queued={}, accepted={}",
        state.round(), quota, queued, accepted,
    );

    RebalanceOutcome { quota, queued, accepted, accepted_per_class }
}

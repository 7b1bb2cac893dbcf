// ============================================================
// Layer 3 — Round State
// ============================================================
// Everything the engine mutates during one self-training round:
//
//   lexicon_mass   phrase → summed confidence, per class
//   encoder_cache  example index → cached encoder prediction
//   assignments    one ProvisionalAssignment per decided example
//   queue_tally    assigned examples per (mapped) class
//   acceptance     AcceptanceRecord for the current unlabeled pool
//
// reset() starts a round from a freshly loaded unlabeled pool.

use std::collections::{HashMap, HashSet};

use crate::domain::assignment::{Prediction, ProvisionalAssignment};
use crate::domain::example::Example;
use crate::domain::label_set::ClassId;
use crate::domain::rebalance::AcceptanceRecord;

#[derive(Debug, Clone)]
pub struct RoundState {
    round:         usize,
    n_classes:     usize,
    lexicon_mass:  Vec<HashMap<String, f64>>,
    encoder_cache: HashMap<usize, Prediction>,
    assignments:   Vec<ProvisionalAssignment>,
    decided:       HashSet<usize>,
    queue_tally:   Vec<usize>,
    acceptance:    AcceptanceRecord,
}

impl RoundState {
    pub fn new(n_classes: usize) -> Self {
        Self {
            round:         0,
            n_classes,
            lexicon_mass:  vec![HashMap::new(); n_classes],
            encoder_cache: HashMap::new(),
            assignments:   Vec::new(),
            decided:       HashSet::new(),
            queue_tally:   vec![0; n_classes],
            acceptance:    AcceptanceRecord::default(),
        }
    }

    /// Clear every accumulator and rebuild the acceptance record
    /// from the unlabeled pool loaded for `round`.
    pub fn reset(&mut self, round: usize, unlabeled: &[Example]) {
        self.round = round;
        self.lexicon_mass.iter_mut().for_each(HashMap::clear);
        self.encoder_cache.clear();
        self.assignments.clear();
        self.decided.clear();
        self.queue_tally.iter_mut().for_each(|t| *t = 0);
        self.acceptance = AcceptanceRecord::from_examples(unlabeled);
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    // ── Lexicon accumulators ──────────────────────────────────────────────────

    pub fn add_lexicon_mass(&mut self, class: ClassId, phrase: &str, confidence: f64) {
        if let Some(mass) = self.lexicon_mass.get_mut(class) {
            *mass.entry(phrase.to_string()).or_insert(0.0) += confidence;
        }
    }

    /// Accumulated phrase mass for a class. `class` must be below `n_classes`.
    pub fn lexicon_mass(&self, class: ClassId) -> &HashMap<String, f64> {
        &self.lexicon_mass[class]
    }

    // ── Encoder prediction cache ──────────────────────────────────────────────

    pub fn cache_encoder_prediction(&mut self, example_index: usize, prediction: Prediction) {
        self.encoder_cache.insert(example_index, prediction);
    }

    pub fn encoder_prediction(&self, example_index: usize) -> Option<Prediction> {
        self.encoder_cache.get(&example_index).copied()
    }

    pub fn cached_predictions(&self) -> usize {
        self.encoder_cache.len()
    }

    // ── Provisional assignments ───────────────────────────────────────────────

    /// Record the verdict for one example. A second verdict for the same
    /// example in the same round is ignored and returns false.
    /// `tally_class` is the (mapped) class the assignment is counted under.
    pub fn record_assignment(
        &mut self,
        assignment:  ProvisionalAssignment,
        tally_class: Option<ClassId>,
    ) -> bool {
        if !self.decided.insert(assignment.example_index) {
            return false;
        }
        if let Some(slot) = tally_class.and_then(|c| self.queue_tally.get_mut(c)) {
            *slot += 1;
        }
        self.assignments.push(assignment);
        true
    }

    pub fn assignments(&self) -> &[ProvisionalAssignment] {
        &self.assignments
    }

    /// Assignments that carry a label, in decision order.
    pub fn queued(&self) -> impl Iterator<Item = &ProvisionalAssignment> {
        self.assignments.iter().filter(|a| a.is_assigned())
    }

    pub fn queue_tally(&self) -> &[usize] {
        &self.queue_tally
    }

    // ── Acceptance record ─────────────────────────────────────────────────────

    pub fn acceptance(&self) -> &AcceptanceRecord {
        &self.acceptance
    }

    pub fn acceptance_mut(&mut self) -> &mut AcceptanceRecord {
        &mut self.acceptance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assignment::AssignmentSource;

    fn pool(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| Example { index: i, text: format!("text {i}"), marker: "0".into(), gold_label: Some(0) })
            .collect()
    }

    #[test]
    fn test_assignment_recorded_once() {
        let mut state = RoundState::new(3);
        state.reset(0, &pool(2));
        let a = ProvisionalAssignment::assigned(1, 2, 0.95, AssignmentSource::Agreement);
        assert!(state.record_assignment(a.clone(), Some(2)));
        assert!(!state.record_assignment(a, Some(2)));
        assert_eq!(state.queue_tally(), &[0, 0, 1]);
        assert_eq!(state.queued().count(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = RoundState::new(2);
        state.reset(0, &pool(3));
        state.add_lexicon_mass(1, "a b c", 0.9);
        state.cache_encoder_prediction(0, Prediction::new(1, 0.99));
        state.record_assignment(ProvisionalAssignment::unassigned(0), None);

        state.reset(1, &pool(1));
        assert_eq!(state.round(), 1);
        assert!(state.lexicon_mass(1).is_empty());
        assert_eq!(state.cached_predictions(), 0);
        assert!(state.assignments().is_empty());
        assert_eq!(state.acceptance().len(), 1);
    }
}

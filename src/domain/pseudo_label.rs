// ============================================================
// Layer 3 — Pseudo-Labeling Engine
// ============================================================
// Assigns a provisional label to one unlabeled example from
//   - per-class lexicon match counts (3-word and 4-word hits)
//   - the encoder prediction cached earlier in the round
//   - the recurrent prediction from the current pass
//
// Rules, first match wins:
//   1. lexicon3  — class c holds the unique positive max of the
//                  3-word counts AND (encoder says c ≥ 0.90 OR
//                  recurrent says c ≥ 0.90)
//   2. lexicon4  — class c holds the unique positive max of the
//                  4-word counts
//   3. agreement — encoder and recurrent name the same class,
//                  both ≥ 0.90
//   4. otherwise unassigned
//
// "Unique max" = every other class is strictly below it.

use serde::{Deserialize, Serialize};

use crate::domain::assignment::{AssignmentSource, Prediction, ProvisionalAssignment};
use crate::domain::error::SelfTrainError;
use crate::domain::label_set::ClassId;
use crate::domain::lexicon::Lexicon;
use crate::domain::matching::{unique_max, MatchCounts};
use crate::domain::round_state::RoundState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PseudoLabelConfig {
    pub primary_matches:      usize,
    pub secondary_matches:    usize,
    pub confidence_threshold: f32,
    /// Class each assignment is tallied under when computing the
    /// rebalancing quota. Empty means identity.
    pub queue_class_map:      Vec<ClassId>,
}

impl Default for PseudoLabelConfig {
    fn default() -> Self {
        Self {
            primary_matches:      3,
            secondary_matches:    4,
            confidence_threshold: 0.9,
            queue_class_map:      Vec::new(),
        }
    }
}

impl PseudoLabelConfig {
    pub fn validate(&self, n_classes: usize) -> Result<(), SelfTrainError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(SelfTrainError::InvalidConfig(format!(
                "confidence threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.queue_class_map.is_empty() {
            return Ok(());
        }
        if self.queue_class_map.len() != n_classes {
            return Err(SelfTrainError::InvalidConfig(format!(
                "queue class map has {} entries for {} classes",
                self.queue_class_map.len(),
                n_classes
            )));
        }
        if let Some(bad) = self.queue_class_map.iter().find(|&&c| c >= n_classes) {
            return Err(SelfTrainError::InvalidConfig(format!(
                "queue class map target {bad} is not a class"
            )));
        }
        Ok(())
    }

    pub fn tally_class(&self, class: ClassId) -> ClassId {
        self.queue_class_map.get(class).copied().unwrap_or(class)
    }
}

pub struct PseudoLabeler<'a> {
    config:  &'a PseudoLabelConfig,
    lexicon: &'a Lexicon,
}

impl<'a> PseudoLabeler<'a> {
    pub fn new(config: &'a PseudoLabelConfig, lexicon: &'a Lexicon) -> Self {
        Self { config, lexicon }
    }

    pub fn match_counts(&self, text: &str) -> MatchCounts {
        MatchCounts::compute(
            self.lexicon.classes(),
            text,
            self.config.primary_matches,
            self.config.secondary_matches,
        )
    }

    /// Apply the rules to one example without touching any state.
    pub fn decide(
        &self,
        example_index: usize,
        text:          &str,
        encoder:       Option<Prediction>,
        recurrent:     Option<Prediction>,
    ) -> ProvisionalAssignment {
        let threshold = self.config.confidence_threshold;
        let counts    = self.match_counts(text);

        let confident = |p: Option<Prediction>, class: ClassId| {
            p.filter(|p| p.supports(class, threshold)).map(|p| p.confidence)
        };

        // ── Rule 1: unique 3-word lexicon winner backed by a classifier ──────
        if let Some(class) = unique_max(&counts.primary) {
            let backing = confident(encoder, class).or_else(|| confident(recurrent, class));
            if let Some(confidence) = backing {
                return ProvisionalAssignment::assigned(
                    example_index, class, confidence, AssignmentSource::Lexicon3,
                );
            }
        }

        // ── Rule 2: unique 4-word lexicon winner ─────────────────────────────
        if let Some(class) = unique_max(&counts.secondary) {
            let confidence = [encoder, recurrent]
                .iter()
                .flatten()
                .filter(|p| p.class == class)
                .map(|p| p.confidence)
                .fold(0.0f32, f32::max);
            return ProvisionalAssignment::assigned(
                example_index, class, confidence, AssignmentSource::Lexicon4,
            );
        }

        // ── Rule 3: both classifiers agree with high confidence ───────────────
        if let (Some(e), Some(r)) = (encoder, recurrent) {
            if e.class == r.class && e.confidence >= threshold && r.confidence >= threshold {
                return ProvisionalAssignment::assigned(
                    example_index, e.class, e.confidence.min(r.confidence), AssignmentSource::Agreement,
                );
            }
        }

        ProvisionalAssignment::unassigned(example_index)
    }

    /// Decide and record one example of the pseudo-labeling pass.
    /// The encoder prediction is read from the round's cache.
    pub fn label(
        &self,
        state:         &mut RoundState,
        example_index: usize,
        text:          &str,
        recurrent:     Option<Prediction>,
    ) -> ProvisionalAssignment {
        let encoder    = state.encoder_prediction(example_index);
        let assignment = self.decide(example_index, text, encoder, recurrent);
        let tally      = assignment.label.map(|c| self.config.tally_class(c));
        if !state.record_assignment(assignment.clone(), tally) {
            tracing::warn!("Example {} was already decided this round", example_index);
        }
        assignment
    }
}

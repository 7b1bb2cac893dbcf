use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::label_set::ClassId;

/// Argmax class and its softmax probability for one example.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class:      ClassId,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(class: ClassId, confidence: f32) -> Self {
        Self { class, confidence }
    }

    /// Argmax over a probability vector. Ties go to the lower class id.
    /// Returns None for an empty vector.
    pub fn from_probs(probs: &[f32]) -> Option<Self> {
        let mut best: Option<Self> = None;
        for (class, &p) in probs.iter().enumerate() {
            match best {
                Some(b) if p <= b.confidence => {}
                _ => best = Some(Self::new(class, p)),
            }
        }
        best
    }

    /// True when this prediction names `class` with at least `threshold`.
    pub fn supports(&self, class: ClassId, threshold: f32) -> bool {
        self.class == class && self.confidence >= threshold
    }
}

/// Which rule produced a provisional label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentSource {
    /// Unique top count of 3-word phrase matches, backed by a confident classifier.
    Lexicon3,
    /// Unique top count of 4-word phrase matches.
    Lexicon4,
    /// Both classifiers agree with high confidence.
    Agreement,
    None,
}

impl fmt::Display for AssignmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentSource::Lexicon3  => "lexicon3",
            AssignmentSource::Lexicon4  => "lexicon4",
            AssignmentSource::Agreement => "agreement",
            AssignmentSource::None      => "none",
        };
        f.write_str(s)
    }
}

/// The engine's verdict for one unlabeled example in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionalAssignment {
    pub example_index: usize,
    pub label:         Option<ClassId>,
    pub confidence:    f32,
    pub source:        AssignmentSource,
}

impl ProvisionalAssignment {
    pub fn assigned(
        example_index: usize,
        label:         ClassId,
        confidence:    f32,
        source:        AssignmentSource,
    ) -> Self {
        Self { example_index, label: Some(label), confidence, source }
    }

    pub fn unassigned(example_index: usize) -> Self {
        Self {
            example_index,
            label:      None,
            confidence: 0.0,
            source:     AssignmentSource::None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.label.is_some()
    }
}

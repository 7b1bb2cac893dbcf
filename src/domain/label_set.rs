// ============================================================
// Layer 3 — Label Set
// ============================================================
// The ordered list of label strings that may appear in the
// first column of a pool file. A label's position in the list
// is its class id, so "3" in the dbpedia preset is class 3.
//
// Presets mirror the benchmark corpora:
//   imdb    → 2 classes
//   ag      → 4 classes
//   yahoo   → 10 classes
//   dbpedia → 14 classes
//
// Anything else is read as a comma-separated list of labels.

use std::collections::HashMap;

use crate::domain::error::SelfTrainError;

/// Index of a class inside a [`LabelSet`].
pub type ClassId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
    index: HashMap<String, ClassId>,
}

impl LabelSet {
    /// Build a label set from explicit names.
    /// Fails on an empty list, blank names or duplicates.
    pub fn new(names: Vec<String>) -> Result<Self, SelfTrainError> {
        if names.is_empty() {
            return Err(SelfTrainError::InvalidConfig(
                "label set must contain at least one label".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (class_id, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(SelfTrainError::InvalidConfig(format!(
                    "label {class_id} is blank"
                )));
            }
            if index.insert(name.clone(), class_id).is_some() {
                return Err(SelfTrainError::InvalidConfig(format!(
                    "label '{name}' appears more than once"
                )));
            }
        }

        Ok(Self { names, index })
    }

    /// Labels "0".."n-1".
    pub fn numeric(n_classes: usize) -> Result<Self, SelfTrainError> {
        Self::new((0..n_classes).map(|c| c.to_string()).collect())
    }

    /// Resolve a preset name (imdb, ag, yahoo, dbpedia) or a
    /// comma-separated label list.
    pub fn parse(spec: &str) -> Result<Self, SelfTrainError> {
        match spec.trim().to_lowercase().as_str() {
            "imdb"    => Self::numeric(2),
            "ag"      => Self::numeric(4),
            "yahoo"   => Self::numeric(10),
            "dbpedia" => Self::numeric(14),
            _ => Self::new(
                spec.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn lookup(&self, label: &str) -> Option<ClassId> {
        self.index.get(label.trim()).copied()
    }

    /// Class id for a pool row's label, or `UnknownLabel`.
    /// `row` is 1-based and only used for the error message.
    pub fn class_id(&self, label: &str, row: usize) -> Result<ClassId, SelfTrainError> {
        self.lookup(label).ok_or_else(|| SelfTrainError::UnknownLabel {
            label:    label.to_string(),
            row,
            expected: self.names.join(","),
        })
    }

    /// Label string for a class id. Out-of-range ids print as the number.
    pub fn name(&self, class_id: ClassId) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

// ============================================================
// Layer 2 — Split Use Case
// ============================================================
// Turns one total-pool TSV into the three files a run starts
// from:
//
//   <data_dir>/<name>_dev.tsv
//   <data_dir>/<name>_labeled.tsv
//   <data_dir>/<name>_unlabeled.tsv
//
// Unlabeled rows keep their gold label as the marker, so a run
// can report how accurate its pseudo-labels were.

use anyhow::Result;
use std::path::Path;

use crate::data::{
    pool::TsvPool,
    splitter::{split_pool, PoolSplit, SplitPlan},
};
use crate::domain::{
    example::{LabeledExample, PoolRow},
    label_set::LabelSet,
    traits::PoolSink,
};

#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub input:     String,
    pub data_dir:  String,
    pub name:      String,
    pub labels:    String,
    pub seed:      u64,
    pub dev:       Option<usize>,
    pub labeled:   Option<usize>,
    pub unlabeled: Option<usize>,
}

pub struct SplitUseCase {
    config: SplitConfig,
}

impl SplitUseCase {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PoolSplit> {
        let cfg    = &self.config;
        let labels = LabelSet::parse(&cfg.labels)?;
        let rows   = TsvPool::new(&cfg.input).read_labeled(&labels)?;
        tracing::info!("Read {} rows from '{}'", rows.len(), cfg.input);

        let plan = SplitPlan::proportional(rows.len(), labels.len())?
            .with_overrides(cfg.dev, cfg.labeled, cfg.unlabeled);
        tracing::info!(
            "Per class: {} dev, {} labeled, {} unlabeled",
            plan.dev_per_class, plan.labeled_per_class, plan.unlabeled_per_class,
        );

        let split = split_pool(rows, labels.len(), &plan, cfg.seed);

        let dir = Path::new(&cfg.data_dir);
        for (part, rows) in [
            ("dev",       &split.dev),
            ("labeled",   &split.labeled),
            ("unlabeled", &split.unlabeled),
        ] {
            let pool = TsvPool::new(dir.join(format!("{}_{part}.tsv", cfg.name)));
            pool.write_rows(&to_rows(rows, &labels))?;
            tracing::info!("Wrote {} rows to '{}'", rows.len(), pool.path().display());
        }

        Ok(split)
    }
}

fn to_rows(examples: &[LabeledExample], labels: &LabelSet) -> Vec<PoolRow> {
    examples
        .iter()
        .map(|e| PoolRow::new(labels.name(e.label), e.text.clone()))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::PoolSource;
    use tempfile::tempdir;

    #[test]
    fn test_split_writes_three_balanced_files() {
        let dir   = tempdir().unwrap();
        let input = dir.path().join("total.tsv");
        let rows: Vec<PoolRow> = (0..30)
            .map(|i| PoolRow::new(["sport", "music", "film"][i % 3], format!("text number {i}")))
            .collect();
        TsvPool::new(input.clone()).write_rows(&rows).unwrap();

        let split = SplitUseCase::new(SplitConfig {
            input:     input.to_string_lossy().to_string(),
            data_dir:  dir.path().to_string_lossy().to_string(),
            name:      "toy".to_string(),
            labels:    "sport,music,film".to_string(),
            seed:      7,
            dev:       Some(1),
            labeled:   Some(2),
            unlabeled: None,
        })
        .execute()
        .unwrap();

        assert_eq!(split.dev.len(), 3);
        assert_eq!(split.labeled.len(), 6);
        // Default cap: (30 - 2·3) / 3 = 8 per class, only 7 left each
        assert_eq!(split.unlabeled.len(), 21);

        let labeled = TsvPool::new(dir.path().join("toy_labeled.tsv")).load_rows().unwrap();
        assert_eq!(labeled.len(), 6);
        assert!(labeled.iter().all(|r| ["sport", "music", "film"].contains(&r.marker.as_str())));
        assert!(dir.path().join("toy_unlabeled.tsv").exists());
    }

    #[test]
    fn test_unknown_label_fails() {
        let dir   = tempdir().unwrap();
        let input = dir.path().join("total.tsv");
        TsvPool::new(input.clone())
            .write_rows(&[PoolRow::new("jazz", "some text")])
            .unwrap();

        let result = SplitUseCase::new(SplitConfig {
            input:     input.to_string_lossy().to_string(),
            data_dir:  dir.path().to_string_lossy().to_string(),
            name:      "toy".to_string(),
            labels:    "sport,music".to_string(),
            seed:      7,
            dev:       None,
            labeled:   None,
            unlabeled: None,
        })
        .execute();
        assert!(result.is_err());
    }
}

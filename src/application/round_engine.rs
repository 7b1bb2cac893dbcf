// ============================================================
// Layer 2 — Round Engine
// ============================================================
// The model-free half of a self-training round. Given what
// the two trained classifiers said about the unlabeled pool,
// it drives the domain layer through the rest of the round:
//
//   Step A: cache encoder predictions       (RoundState)
//   Step B: mine + persist the lexicon      (LexiconMiner, LexiconRepository)
//   Step C: reload lexicon, pseudo-label    (PseudoLabeler)
//   Step D: rebalance + rewrite both pools  (rebalance, PoolSink)
//
// Classifier outputs arrive keyed by example index, so nothing
// here depends on the order the inference passes produced them.

use anyhow::{Context, Result};
use rand::Rng;
use std::collections::HashMap;

use crate::data::preprocessor::Preprocessor;
use crate::domain::{
    assignment::{AssignmentSource, Prediction},
    example::Example,
    label_set::LabelSet,
    lexicon::{Lexicon, LexiconMiner, MinerConfig},
    pseudo_label::{PseudoLabelConfig, PseudoLabeler},
    rebalance::{rebalance, RebalanceOutcome},
    round_state::RoundState,
    traits::{LexiconRepository, PoolSink, SurfaceTokenizer},
};
use crate::ml::inferencer::ExampleOutput;

/// What one round did to the pools.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub unlabeled:        usize,
    pub assigned:         usize,
    pub by_source:        HashMap<AssignmentSource, usize>,
    pub rebalance:        RebalanceOutcome,
    pub pseudo_label_acc: Option<f64>,
}

pub struct RoundEngine<'a, L, T> {
    miner:     LexiconMiner,
    labeling:  &'a PseudoLabelConfig,
    lexicons:  &'a L,
    tokenizer: &'a T,
    pre:       Preprocessor,
}

impl<'a, L, T> RoundEngine<'a, L, T>
where
    L: LexiconRepository,
    T: SurfaceTokenizer,
{
    pub fn new(
        miner:     MinerConfig,
        labeling:  &'a PseudoLabelConfig,
        lexicons:  &'a L,
        tokenizer: &'a T,
    ) -> Self {
        Self {
            miner: LexiconMiner::new(miner),
            labeling,
            lexicons,
            tokenizer,
            pre: Preprocessor::new(),
        }
    }

    // ── Step A ────────────────────────────────────────────────────────────────
    pub fn cache_encoder(&self, state: &mut RoundState, encoder: &[ExampleOutput]) {
        for out in encoder {
            if let Some(p) = Prediction::from_probs(&out.probs) {
                state.cache_encoder_prediction(out.example_index, p);
            }
        }
        tracing::debug!("Cached {} encoder predictions", state.cached_predictions());
    }

    // ── Step B ────────────────────────────────────────────────────────────────
    /// One in-order pass over the pool feeding the recurrent
    /// classifier's attention to the miner, then persist the result.
    pub fn mine(
        &self,
        state:     &mut RoundState,
        unlabeled: &[Example],
        recurrent: &[ExampleOutput],
    ) -> Result<Lexicon> {
        let by_index = index_outputs(recurrent);
        let mut phrases = 0usize;

        for example in unlabeled {
            let Some(out) = by_index.get(&example.index) else { continue };
            // The classifier saw the cleaned text, so positions refer to it
            let text   = self.pre.clean(&example.text);
            let tokens = self
                .tokenizer
                .surface_tokens(&text)
                .with_context(|| format!("Cannot tokenise unlabeled row {}", example.index + 1))?;
            if self.miner.observe(state, &text, &tokens, &out.attention, &out.probs).is_some() {
                phrases += 1;
            }
        }

        let lexicon = self.miner.finalize(state);
        self.lexicons.save(&lexicon)?;
        tracing::info!(
            "Mined lexicon: {} examples contributed, {} phrases kept",
            phrases,
            lexicon.total_phrases(),
        );
        Ok(lexicon)
    }

    // ── Step C ────────────────────────────────────────────────────────────────
    /// Reload the lexicon from disk and decide every example once.
    /// Returns the number of examples given a provisional label.
    pub fn pseudo_label(
        &self,
        state:     &mut RoundState,
        unlabeled: &[Example],
        recurrent: &[ExampleOutput],
    ) -> Result<usize> {
        let lexicon  = self.lexicons.load(state.n_classes())?;
        let labeler  = PseudoLabeler::new(self.labeling, &lexicon);
        let by_index = index_outputs(recurrent);
        let mut assigned = 0usize;

        for example in unlabeled {
            let recurrent = by_index
                .get(&example.index)
                .and_then(|out| Prediction::from_probs(&out.probs));
            if labeler.label(state, example.index, &example.text, recurrent).is_assigned() {
                assigned += 1;
            }
        }

        tracing::info!("Pseudo-labeled {} of {} examples", assigned, unlabeled.len());
        Ok(assigned)
    }

    // ── Step D ────────────────────────────────────────────────────────────────
    /// Accept a class-balanced subset, append it to the labeled
    /// pool and rewrite the unlabeled pool with everything else.
    pub fn settle<R, P, Q>(
        &self,
        state:          &mut RoundState,
        labels:         &LabelSet,
        rng:            &mut R,
        labeled_pool:   &P,
        unlabeled_pool: &Q,
    ) -> Result<RoundSummary>
    where
        R: Rng + ?Sized,
        P: PoolSink,
        Q: PoolSink,
    {
        let mut by_source: HashMap<AssignmentSource, usize> = HashMap::new();
        for a in state.queued() {
            *by_source.entry(a.source).or_default() += 1;
        }
        let assigned = state.queued().count();
        let outcome  = rebalance(state, rng);
        if outcome.is_starved() {
            tracing::warn!("Round {}: no provisional labels, pools unchanged", state.round());
        }

        let record    = state.acceptance();
        let accepted  = record.accepted_rows(labels);
        let pending   = record.pending_rows();
        let unlabeled = record.len();
        let accuracy  = record.gold_agreement(labels);

        // Pending rows replace the unlabeled pool only once the append succeeded
        unlabeled_pool.stage_rows(&pending)?;
        labeled_pool.append_rows(&accepted)?;
        unlabeled_pool.commit_staged()?;
        state.acceptance_mut().clear();

        tracing::info!(
            "Round {}: accepted {} of {} queued (quota {}), {} left unlabeled",
            state.round(), outcome.accepted, outcome.queued, outcome.quota, pending.len(),
        );

        Ok(RoundSummary {
            unlabeled,
            assigned,
            by_source,
            rebalance: outcome,
            pseudo_label_acc: accuracy,
        })
    }
}

fn index_outputs(outputs: &[ExampleOutput]) -> HashMap<usize, &ExampleOutput> {
    outputs.iter().map(|o| (o.example_index, o)).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::pool::TsvPool;
    use crate::domain::example::PoolRow;
    use crate::domain::traits::PoolSource;
    use crate::infra::lexicon_store::LexiconStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::tempdir;

    /// Lower-cased whitespace tokens.
    struct SpaceTokenizer;

    impl SurfaceTokenizer for SpaceTokenizer {
        fn surface_tokens(&self, text: &str) -> Result<Vec<String>> {
            Ok(text.split_whitespace().map(str::to_lowercase).collect())
        }
    }

    fn output(example_index: usize, probs: Vec<f32>, attention: Vec<f32>) -> ExampleOutput {
        ExampleOutput { example_index, probs, attention }
    }

    fn example(index: usize, marker: &str, text: &str) -> Example {
        Example { index, text: text.to_string(), marker: marker.to_string(), gold_label: None }
    }

    #[test]
    fn test_mined_phrase_is_saved_and_drives_labeling() {
        let dir      = tempdir().unwrap();
        let lexicons = LexiconStore::new(dir.path().join("lex").to_string_lossy().to_string());
        let labeling = PseudoLabelConfig::default();
        let engine   = RoundEngine::new(MinerConfig::default(), &labeling, &lexicons, &SpaceTokenizer);

        let unlabeled = vec![
            example(0, "-1", "guitar album tour band"),
            example(1, "-1", "the guitar album tour"),
        ];
        let mut state = RoundState::new(2);
        state.reset(0, &unlabeled);

        // Recurrent model attends to the four words of example 0 and is sure of class 1
        let recurrent = vec![
            output(0, vec![0.05, 0.95], vec![0.4, 0.3, 0.2, 0.1]),
            output(1, vec![0.5, 0.5],   vec![0.0; 4]),
        ];
        let lexicon = engine.mine(&mut state, &unlabeled, &recurrent).unwrap();
        assert_eq!(lexicon.phrases(1), &["guitar album tour band".to_string()]);
        assert!(lexicon.phrases(0).is_empty());

        // Example 1 matches three words of the phrase and the encoder backs
        // class 1; example 0 matches all four words
        engine.cache_encoder(&mut state, &[output(1, vec![0.02, 0.98], vec![])]);
        let assigned = engine.pseudo_label(&mut state, &unlabeled, &recurrent).unwrap();
        assert_eq!(assigned, 2);

        let source = |idx: usize| {
            let a = state.assignments().iter().find(|a| a.example_index == idx).unwrap();
            (a.label, a.source)
        };
        assert_eq!(source(0), (Some(1), AssignmentSource::Lexicon4));
        assert_eq!(source(1), (Some(1), AssignmentSource::Lexicon3));
    }

    #[test]
    fn test_unassigned_example_is_written_back_unchanged() {
        let dir       = tempdir().unwrap();
        let lexicons  = LexiconStore::new(dir.path().join("lex").to_string_lossy().to_string());
        let labeled   = TsvPool::new(dir.path().join("labeled.tsv"));
        let unl_pool  = TsvPool::new(dir.path().join("unlabeled.tsv"));
        let labeling  = PseudoLabelConfig::default();
        let engine    = RoundEngine::new(MinerConfig::default(), &labeling, &lexicons, &SpaceTokenizer);
        let labels    = LabelSet::numeric(2).unwrap();

        labeled.write_rows(&[PoolRow::new("0", "seed row")]).unwrap();
        lexicons.save(&Lexicon::empty(2)).unwrap();

        let unlabeled = vec![example(0, "-1", "Nothing, matches here!")];
        let mut state = RoundState::new(2);
        state.reset(0, &unlabeled);

        // Classifiers disagree
        engine.cache_encoder(&mut state, &[output(0, vec![0.97, 0.03], vec![])]);
        let recurrent = vec![output(0, vec![0.02, 0.98], vec![0.5, 0.3, 0.2])];
        assert_eq!(engine.pseudo_label(&mut state, &unlabeled, &recurrent).unwrap(), 0);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let summary = engine.settle(&mut state, &labels, &mut rng, &labeled, &unl_pool).unwrap();
        assert!(summary.rebalance.is_starved());
        assert_eq!(summary.pseudo_label_acc, None);

        assert_eq!(unl_pool.load_rows().unwrap(), vec![PoolRow::new("-1", "Nothing, matches here!")]);
        assert_eq!(labeled.load_rows().unwrap().len(), 1);
    }

    #[test]
    fn test_accepted_rows_move_to_labeled_pool() {
        let dir       = tempdir().unwrap();
        let lexicons  = LexiconStore::new(dir.path().join("lex").to_string_lossy().to_string());
        let labeled   = TsvPool::new(dir.path().join("labeled.tsv"));
        let unl_pool  = TsvPool::new(dir.path().join("unlabeled.tsv"));
        let labeling  = PseudoLabelConfig::default();
        let engine    = RoundEngine::new(MinerConfig::default(), &labeling, &lexicons, &SpaceTokenizer);
        let labels    = LabelSet::numeric(2).unwrap();

        labeled.write_rows(&[]).unwrap();
        lexicons.save(&Lexicon::empty(2)).unwrap();

        let unlabeled = vec![
            example(0, "0", "first"),
            example(1, "1", "second"),
            example(2, "1", "third"),
        ];
        let mut state = RoundState::new(2);
        state.reset(0, &unlabeled);

        // Both classifiers agree on every row
        let preds = vec![
            output(0, vec![0.95, 0.05], vec![]),
            output(1, vec![0.04, 0.96], vec![]),
            output(2, vec![0.03, 0.97], vec![]),
        ];
        engine.cache_encoder(&mut state, &preds);
        assert_eq!(engine.pseudo_label(&mut state, &unlabeled, &preds).unwrap(), 3);

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let summary = engine.settle(&mut state, &labels, &mut rng, &labeled, &unl_pool).unwrap();

        // Class 0 was queued once, so each class gets one slot
        assert_eq!(summary.rebalance.quota, 1);
        assert_eq!(summary.rebalance.accepted, 2);
        assert_eq!(summary.by_source.get(&AssignmentSource::Agreement), Some(&3));
        assert_eq!(summary.pseudo_label_acc, Some(1.0));
        assert_eq!(labeled.load_rows().unwrap().len(), 2);
        assert_eq!(unl_pool.load_rows().unwrap().len(), 1);
        assert!(state.acceptance().is_empty());
    }

    /// Labeled sink whose appends always fail.
    struct FullDisk;

    impl PoolSink for FullDisk {
        fn write_rows(&self, _rows: &[PoolRow]) -> Result<()> {
            anyhow::bail!("disk full")
        }
        fn append_rows(&self, _rows: &[PoolRow]) -> Result<()> {
            anyhow::bail!("disk full")
        }
        fn stage_rows(&self, _rows: &[PoolRow]) -> Result<()> {
            anyhow::bail!("disk full")
        }
        fn commit_staged(&self) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_failed_append_leaves_unlabeled_pool_untouched() {
        let dir       = tempdir().unwrap();
        let lexicons  = LexiconStore::new(dir.path().join("lex").to_string_lossy().to_string());
        let unl_pool  = TsvPool::new(dir.path().join("unlabeled.tsv"));
        let labeling  = PseudoLabelConfig::default();
        let engine    = RoundEngine::new(MinerConfig::default(), &labeling, &lexicons, &SpaceTokenizer);
        let labels    = LabelSet::numeric(2).unwrap();

        let before = vec![PoolRow::new("0", "first"), PoolRow::new("1", "second")];
        unl_pool.write_rows(&before).unwrap();
        lexicons.save(&Lexicon::empty(2)).unwrap();

        let unlabeled = vec![example(0, "0", "first"), example(1, "1", "second")];
        let mut state = RoundState::new(2);
        state.reset(0, &unlabeled);

        let preds = vec![
            output(0, vec![0.95, 0.05], vec![]),
            output(1, vec![0.04, 0.96], vec![]),
        ];
        engine.cache_encoder(&mut state, &preds);
        assert_eq!(engine.pseudo_label(&mut state, &unlabeled, &preds).unwrap(), 2);

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(engine.settle(&mut state, &labels, &mut rng, &FullDisk, &unl_pool).is_err());

        // Accepted rows were never persisted, so they must still be unlabeled
        assert_eq!(unl_pool.load_rows().unwrap(), before);
    }
}

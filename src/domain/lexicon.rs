// ============================================================
// Layer 3 — Lexicon Mining
// ============================================================
// Turns the recurrent classifier's attention into a ranked
// keyword lexicon per class.
//
// Per unlabeled example (one pass, file order):
//   1. pick attention positions (top-4, or the in-range peak)
//   2. map each picked token back to the original word
//   3. drop stopwords / short tokens, dedupe, keep first seen
//   4. if ≥ 3 keywords remain, the space-joined phrase gets
//      the example's top-class confidence added to its mass
//      under the predicted class
//
// After the pass every class keeps its 50 heaviest phrases.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::assignment::Prediction;
use crate::domain::label_set::ClassId;
use crate::domain::round_state::RoundState;

/// Function words that never become keywords.
pub const STOPWORDS: &[&str] = &[
    "from", "are", "is", "and", "with", "may", "would", "could", "have", "has", "had", "was",
    "were", "this", "who", "that",
];

/// Characters stripped from attended tokens and from the words they map to.
const KEYWORD_STRIP_CHARS: &[char] = &['.', ',', '\'', '!', '?', '"'];

/// Shortest token (in chars) accepted as a keyword.
const MIN_KEYWORD_CHARS: usize = 2;

// ─── Lexicon ──────────────────────────────────────────────────────────────────
/// One ordered phrase list per class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lexicon {
    classes: Vec<Vec<String>>,
}

impl Lexicon {
    pub fn empty(n_classes: usize) -> Self {
        Self { classes: vec![Vec::new(); n_classes] }
    }

    pub fn from_classes(classes: Vec<Vec<String>>) -> Self {
        Self { classes }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn phrases(&self, class: ClassId) -> &[String] {
        self.classes.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn classes(&self) -> &[Vec<String>] {
        &self.classes
    }

    pub fn total_phrases(&self) -> usize {
        self.classes.iter().map(Vec::len).sum()
    }
}

// ─── Miner configuration ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Attention positions taken when the peak is in range.
    pub top_k:        usize,
    /// Distinct keywords an example needs to produce a phrase.
    pub min_keywords: usize,
    /// Phrases kept per class.
    pub lexicon_size: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self { top_k: 4, min_keywords: 3, lexicon_size: 50 }
    }
}

// ─── LexiconMiner ─────────────────────────────────────────────────────────────
pub struct LexiconMiner {
    config: MinerConfig,
}

impl LexiconMiner {
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    /// Attention positions to read keywords from.
    ///
    /// * peak weight ≤ 0        → nothing
    /// * peak inside the tokens → top-k positions
    /// * peak in padding        → single highest in-range position
    ///
    /// Positions at or beyond `token_count` are always dropped.
    pub fn select_positions(&self, attention: &[f32], token_count: usize) -> Vec<usize> {
        let Some((peak_index, peak)) = argmax(attention) else {
            return Vec::new();
        };
        if peak <= 0.0 {
            return Vec::new();
        }

        if peak_index < token_count {
            let mut order: Vec<usize> = (0..attention.len()).collect();
            order.sort_by(|&a, &b| {
                attention[b]
                    .partial_cmp(&attention[a])
                    .unwrap_or(Ordering::Equal)
                    .then(a.cmp(&b))
            });
            order
                .into_iter()
                .take(self.config.top_k)
                .filter(|&p| p < token_count)
                .collect()
        } else {
            let in_range = &attention[..token_count.min(attention.len())];
            argmax(in_range).map(|(i, _)| vec![i]).unwrap_or_default()
        }
    }

    /// Keywords for the selected tokens, deduplicated in first-seen order.
    ///
    /// Each token is cleaned and matched against the whitespace words of
    /// `raw_text`; the first word that contains it (ignoring case) is
    /// cleaned, lower-cased and kept.
    pub fn extract_keywords(&self, raw_text: &str, tokens: &[String], positions: &[usize]) -> Vec<String> {
        let words: Vec<&str> = raw_text.split(' ').collect();
        let mut keywords: Vec<String> = Vec::new();

        for &pos in positions {
            let Some(token) = tokens.get(pos) else { continue };
            let token = strip_keyword_chars(token).to_lowercase();
            if !is_keyword_candidate(&token) {
                continue;
            }

            let found = words
                .iter()
                .find(|w| w.to_lowercase().contains(token.as_str()))
                .map(|w| strip_keyword_chars(w).to_lowercase());

            if let Some(word) = found {
                if !keywords.contains(&word) {
                    keywords.push(word);
                }
            }
        }
        keywords
    }

    /// Feed one example of the mining pass.
    ///
    /// `tokens` are the surface forms of the recurrent tokenizer for
    /// `raw_text`, `attention` is the classifier's attention row and
    /// `probs` its softmax output. Returns the phrase credited, if any.
    pub fn observe(
        &self,
        state:     &mut RoundState,
        raw_text:  &str,
        tokens:    &[String],
        attention: &[f32],
        probs:     &[f32],
    ) -> Option<String> {
        let prediction = Prediction::from_probs(probs)?;
        let positions  = self.select_positions(attention, tokens.len());
        let keywords   = self.extract_keywords(raw_text, tokens, &positions);
        if keywords.len() < self.config.min_keywords {
            return None;
        }

        let phrase = keywords.join(" ");
        state.add_lexicon_mass(prediction.class, &phrase, prediction.confidence as f64);
        Some(phrase)
    }

    /// Rank every class's phrases by accumulated confidence (ties by
    /// phrase text) and keep the top `lexicon_size`.
    pub fn finalize(&self, state: &RoundState) -> Lexicon {
        let classes = (0..state.n_classes())
            .map(|class| {
                let mut ranked: Vec<(&String, f64)> = state
                    .lexicon_mass(class)
                    .iter()
                    .map(|(phrase, &mass)| (phrase, mass))
                    .collect();
                ranked.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.0.cmp(b.0))
                });
                ranked
                    .into_iter()
                    .take(self.config.lexicon_size)
                    .map(|(phrase, _)| phrase.clone())
                    .collect()
            })
            .collect();
        Lexicon::from_classes(classes)
    }
}

/// Index and value of the first maximum.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
}

fn strip_keyword_chars(s: &str) -> String {
    s.chars().filter(|c| !KEYWORD_STRIP_CHARS.contains(c)).collect()
}

fn is_keyword_candidate(token: &str) -> bool {
    let trimmed = token.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() >= MIN_KEYWORD_CHARS
        && !STOPWORDS.contains(&trimmed)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split(' ').map(str::to_string).collect()
    }

    fn miner() -> LexiconMiner {
        LexiconMiner::new(MinerConfig::default())
    }

    #[test]
    fn test_select_top_k_when_peak_in_range() {
        let att = [0.05, 0.30, 0.10, 0.25, 0.20, 0.10];
        assert_eq!(miner().select_positions(&att, 6), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_select_drops_out_of_range_positions() {
        // peak (1) is in range but the next best (4) is padding
        let att = [0.1, 0.4, 0.05, 0.2, 0.25, 0.0];
        assert_eq!(miner().select_positions(&att, 4), vec![1, 3, 0]);
    }

    #[test]
    fn test_select_single_when_peak_out_of_range() {
        let att = [0.1, 0.3, 0.05, 0.6];
        assert_eq!(miner().select_positions(&att, 3), vec![1]);
    }

    #[test]
    fn test_select_nothing_for_non_positive_peak() {
        assert!(miner().select_positions(&[0.0, 0.0, 0.0], 3).is_empty());
        assert!(miner().select_positions(&[], 3).is_empty());
    }

    #[test]
    fn test_extract_keywords_maps_to_original_words() {
        let text   = "The Bank's river, city is Great";
        let tokens = toks("the bank s river city is great");
        let kw = miner().extract_keywords(text, &tokens, &[1, 3, 4, 5, 6]);
        // "is" is a stopword
        assert_eq!(kw, vec!["banks", "river", "city", "great"]);
    }

    #[test]
    fn test_extract_keywords_dedupes_in_order() {
        let text   = "Rivers flow rivers";
        let tokens = toks("rivers flow rivers");
        let kw = miner().extract_keywords(text, &tokens, &[0, 2, 1]);
        assert_eq!(kw, vec!["rivers", "flow"]);
    }

    #[test]
    fn test_observe_requires_three_keywords() {
        let mut state = RoundState::new(2);
        let m = miner();
        let text   = "alpha beta";
        let tokens = toks("alpha beta");
        let out = m.observe(&mut state, text, &tokens, &[0.6, 0.4], &[0.2, 0.8]);
        assert!(out.is_none());
        assert!(state.lexicon_mass(1).is_empty());
    }

    #[test]
    fn test_observe_accumulates_confidence_per_class() {
        let mut state = RoundState::new(2);
        let m = miner();
        let text   = "alpha beta gamma";
        let tokens = toks("alpha beta gamma");
        let att    = [0.5, 0.3, 0.2];

        let phrase = m.observe(&mut state, text, &tokens, &att, &[0.1, 0.9]);
        assert_eq!(phrase.as_deref(), Some("alpha beta gamma"));
        m.observe(&mut state, text, &tokens, &att, &[0.2, 0.8]);

        let mass = state.lexicon_mass(1)["alpha beta gamma"];
        assert!((mass - 1.7).abs() < 1e-6);
    }

    #[test]
    fn test_finalize_ranks_and_truncates() {
        let mut state = RoundState::new(1);
        state.add_lexicon_mass(0, "b b b", 0.5);
        state.add_lexicon_mass(0, "a a a", 0.5);
        state.add_lexicon_mass(0, "c c c", 0.9);

        let m = LexiconMiner::new(MinerConfig { lexicon_size: 2, ..MinerConfig::default() });
        let lexicon = m.finalize(&state);
        assert_eq!(lexicon.phrases(0), &["c c c".to_string(), "a a a".to_string()]);
    }

    #[test]
    fn test_finalize_is_deterministic() {
        let build = || {
            let mut state = RoundState::new(3);
            let m = miner();
            let tokens = toks("red green blue yellow");
            for probs in [[0.9, 0.05, 0.05], [0.1, 0.8, 0.1], [0.95, 0.0, 0.05]] {
                m.observe(&mut state, "red green blue yellow", &tokens, &[0.4, 0.3, 0.2, 0.1], &probs);
            }
            m.finalize(&state)
        };
        assert_eq!(build(), build());
    }
}

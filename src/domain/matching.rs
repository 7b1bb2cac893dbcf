// ============================================================
// Layer 3 — Lexicon Phrase Matching
// ============================================================
// Decides which lexicon phrases "hit" an input text.
//
// A phrase is a space-joined list of keywords. For every
// phrase word we look for the first input word that
//   1. contains the phrase word (case-insensitive), and
//   2. is at most 3 characters longer than the phrase word.
// The number of phrase words found this way is the phrase's
// matched-word count. A phrase contributes to the threshold-t
// result only when that count is exactly t.
//
// Example (t = 3):
//   phrase "river city bank"   input "the banks of the river city"
//   river → "river", city → "city", bank → "banks"  ⇒ 3 ✓
//
// Per class the engine needs two numbers: how many distinct
// phrases reach exactly 3 and exactly 4 matched words.

use std::collections::BTreeSet;

use crate::domain::label_set::ClassId;

/// Characters removed from input text before matching.
const MATCH_STRIP_CHARS: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '.', '?', '"', '~', '/', '<', '>', ':',
    ';', '\'', '{', '}',
];

/// Slack allowed between an input word's length and the phrase word it contains.
const LENGTH_SLACK: usize = 3;

/// Strip the punctuation class used before matching.
pub fn clean_for_matching(text: &str) -> String {
    text.chars().filter(|c| !MATCH_STRIP_CHARS.contains(c)).collect()
}

/// Lower-cased, single-space-split words of an already cleaned text.
pub fn input_words(cleaned: &str) -> Vec<String> {
    cleaned.to_lowercase().split(' ').map(str::to_string).collect()
}

/// How many words of `phrase` occur in `words` under the containment rule.
pub fn phrase_match_count(phrase: &str, words: &[String]) -> usize {
    phrase
        .split(' ')
        .filter(|phrase_word| {
            let needle = phrase_word.to_lowercase();
            let needle_len = phrase_word.chars().count();
            words.iter().any(|word| {
                word.contains(needle.as_str())
                    && needle_len + LENGTH_SLACK >= word.chars().count()
            })
        })
        .count()
}

/// Distinct phrases of `lexicon` whose matched-word count equals `threshold`.
pub fn matched_phrases<'a>(
    lexicon:   &'a [String],
    words:     &[String],
    threshold: usize,
) -> BTreeSet<&'a str> {
    lexicon
        .iter()
        .filter(|phrase| phrase_match_count(phrase, words) == threshold)
        .map(String::as_str)
        .collect()
}

/// Per-class counts of distinct matching phrases at the two thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchCounts {
    pub primary:   Vec<usize>,
    pub secondary: Vec<usize>,
}

impl MatchCounts {
    /// Count matches of `text` against every class lexicon.
    pub fn compute(
        lexicons:  &[Vec<String>],
        text:      &str,
        primary:   usize,
        secondary: usize,
    ) -> Self {
        let words = input_words(&clean_for_matching(text));
        let (primary, secondary) = lexicons
            .iter()
            .map(|phrases| {
                (
                    matched_phrases(phrases, &words, primary).len(),
                    matched_phrases(phrases, &words, secondary).len(),
                )
            })
            .unzip();
        Self { primary, secondary }
    }
}

/// The class holding the strict maximum of `counts`.
///
/// Returns a class only when the maximum is positive and every other
/// class falls strictly below it (exactly `n - 1` classes under the max).
pub fn unique_max(counts: &[usize]) -> Option<ClassId> {
    let max = counts.iter().copied().max()?;
    if max == 0 {
        return None;
    }
    let below = counts.iter().filter(|&&c| c < max).count();
    if below + 1 != counts.len() {
        return None;
    }
    counts.iter().position(|&c| c == max)
}

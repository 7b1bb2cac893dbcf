// ============================================================
// Layer 4 — Sequence Encoding
// ============================================================
// Turns (text, optional second text, label) into a padded
// ClassificationSample for one of the two classifier paths.
//
//   Encoder path (WordPiece tokenizer):
//     [CLS] a [SEP]            segment 0
//     [CLS] a [SEP] b [SEP]    segment 0 … 0 1 … 1
//     budget: L-2 single / L-3 pair
//
//   Recurrent path (WordLevel tokenizer, OOV → 0):
//     a  |  a b                no special tokens
//     same budgets, so both paths see the same words
//
// Both tokenizers lower-case, strip accents and isolate
// punctuation (BertNormalizer + BertPreTokenizer).
//
// Reference: Devlin et al. (2019) BERT, input representation
//            tokenizers crate documentation

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

use crate::data::dataset::ClassificationSample;
use crate::data::preprocessor::{pad_to, truncate_pair};
use crate::domain::traits::SurfaceTokenizer;

/// Which classifier the samples are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingPath {
    /// [CLS]/[SEP] wrapping with segment ids.
    Encoder { cls_id: u32, sep_id: u32 },
    /// Bare word ids.
    Recurrent,
}

pub struct TextEncoder {
    tokenizer: Tokenizer,
    path:      EncodingPath,
    max_len:   usize,
}

impl TextEncoder {
    /// Encoder-path encoder; the tokenizer vocabulary must contain [CLS] and [SEP].
    pub fn for_encoder(tokenizer: Tokenizer, max_len: usize) -> Result<Self> {
        let cls_id = tokenizer
            .token_to_id("[CLS]")
            .ok_or_else(|| anyhow!("WordPiece vocabulary has no [CLS] token"))?;
        let sep_id = tokenizer
            .token_to_id("[SEP]")
            .ok_or_else(|| anyhow!("WordPiece vocabulary has no [SEP] token"))?;
        Self::checked(tokenizer, EncodingPath::Encoder { cls_id, sep_id }, max_len)
    }

    pub fn for_recurrent(tokenizer: Tokenizer, max_len: usize) -> Result<Self> {
        Self::checked(tokenizer, EncodingPath::Recurrent, max_len)
    }

    fn checked(tokenizer: Tokenizer, path: EncodingPath, max_len: usize) -> Result<Self> {
        if max_len < 4 {
            return Err(anyhow!("max sequence length {max_len} is too short (need at least 4)"));
        }
        Ok(Self { tokenizer, path, max_len })
    }

    /// Rows an embedding table needs: highest token id + 1.
    pub fn vocab_size(&self) -> usize {
        self.tokenizer
            .get_vocab(true)
            .values()
            .max()
            .map_or(0, |&id| id as usize + 1)
    }

    /// Token ids of `text` without special tokens.
    pub fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    /// Build one padded sample.
    pub fn encode(
        &self,
        example_index: usize,
        text_a:        &str,
        text_b:        Option<&str>,
        label:         Option<usize>,
    ) -> Result<ClassificationSample> {
        let mut a = self.token_ids(text_a)?;
        let mut b = match text_b {
            Some(t) => self.token_ids(t)?,
            None    => Vec::new(),
        };

        // ── Truncate to the budget left after special tokens ──────────────────
        let budget = if text_b.is_some() { self.max_len - 3 } else { self.max_len - 2 };
        truncate_pair(&mut a, &mut b, budget);

        // ── Assemble ids and segments ─────────────────────────────────────────
        let (input_ids, segment_ids) = match self.path {
            EncodingPath::Encoder { cls_id, sep_id } => {
                let mut ids = Vec::with_capacity(self.max_len);
                ids.push(cls_id);
                ids.extend_from_slice(&a);
                ids.push(sep_id);
                let mut segs = vec![0u32; ids.len()];
                if text_b.is_some() {
                    ids.extend_from_slice(&b);
                    ids.push(sep_id);
                    segs.resize(ids.len(), 1);
                }
                (ids, segs)
            }
            EncodingPath::Recurrent => {
                let mut segs = vec![0u32; a.len()];
                let mut ids  = a;
                ids.extend_from_slice(&b);
                segs.resize(ids.len(), 1);
                (ids, segs)
            }
        };

        // ── Pad to max_len ────────────────────────────────────────────────────
        let true_length    = input_ids.len();
        let attention_mask = pad_to(vec![1u32; true_length], self.max_len);

        Ok(ClassificationSample {
            example_index,
            input_ids:   pad_to(input_ids, self.max_len),
            segment_ids: pad_to(segment_ids, self.max_len),
            attention_mask,
            label,
            true_length,
        })
    }
}

impl SurfaceTokenizer for TextEncoder {
    /// Lower-cased original substrings behind every token. Offsets are
    /// used instead of vocabulary strings so out-of-vocabulary words
    /// keep their text.
    fn surface_tokens(&self, text: &str) -> Result<Vec<String>> {
        let enc = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;

        Ok(enc
            .get_offsets()
            .iter()
            .zip(enc.get_tokens())
            .map(|(&(start, end), token)| {
                text.get(start..end)
                    .map(str::to_lowercase)
                    .unwrap_or_else(|| token.trim_start_matches("##").to_string())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;
    use tempfile::tempdir;

    fn corpus() -> Vec<String> {
        vec![
            "The river flows through the old city".to_string(),
            "A new album from the band".to_string(),
        ]
    }

    fn recurrent(max_len: usize) -> TextEncoder {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        let tok   = store.build_word_level(&corpus(), None, 1000).unwrap();
        TextEncoder::for_recurrent(tok, max_len).unwrap()
    }

    fn encoder(max_len: usize) -> TextEncoder {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        let tok   = store.build_wordpiece(&corpus(), None, 1000).unwrap();
        TextEncoder::for_encoder(tok, max_len).unwrap()
    }

    #[test]
    fn test_true_length_matches_mask() {
        let enc    = recurrent(12);
        let sample = enc.encode(3, "the river flows", None, Some(1)).unwrap();
        assert_eq!(sample.example_index, 3);
        assert_eq!(sample.input_ids.len(), 12);
        assert_eq!(sample.true_length, 3);
        assert_eq!(sample.attention_mask.iter().filter(|&&m| m == 1).count(), sample.true_length);
    }

    #[test]
    fn test_oov_maps_to_zero() {
        let enc = recurrent(8);
        let ids = enc.token_ids("river zeppelin").unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], 0);
        assert_eq!(ids[1], 0);
    }

    #[test]
    fn test_encoder_wraps_with_cls_and_sep() {
        let enc    = encoder(16);
        let sample = enc.encode(0, "old city", Some("new band"), None).unwrap();
        let cls    = enc.tokenizer.token_to_id("[CLS]").unwrap();
        let sep    = enc.tokenizer.token_to_id("[SEP]").unwrap();
        assert_eq!(sample.input_ids[0], cls);
        assert_eq!(sample.input_ids.iter().filter(|&&t| t == sep).count(), 2);
        let ones = sample.segment_ids.iter().filter(|&&s| s == 1).count();
        assert!(ones >= 2);
        assert_eq!(sample.attention_mask.iter().sum::<u32>() as usize, sample.true_length);
    }

    #[test]
    fn test_long_input_is_cut_to_budget() {
        let enc    = recurrent(6);
        let sample = enc.encode(0, "the river flows through the old city", None, None).unwrap();
        assert_eq!(sample.true_length, 4);
    }

    #[test]
    fn test_surface_tokens_keep_unknown_words() {
        let enc  = recurrent(8);
        let toks = enc.surface_tokens("River Zeppelin, city").unwrap();
        assert_eq!(toks, vec!["river", "zeppelin", ",", "city"]);
    }
}

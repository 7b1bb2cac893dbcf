// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads the two tokenizers:
//
//   wordpiece.json  — encoder path. Vocabulary from a BERT
//                     vocab.txt (id = line number) or, without
//                     one, from the corpus: specials, every
//                     character (bare and ##-prefixed), then
//                     the most frequent words.
//   wordlevel.json  — recurrent path. "[UNK]" = 0 so unknown
//                     words and padding share the zero row of
//                     the embedding table. Vocabulary from the
//                     word-vector file when given (row k ↔ id k),
//                     otherwise corpus word frequencies.
//
// Both use BertNormalizer (lower-case, strip accents) and
// BertPreTokenizer (split on whitespace and punctuation).
//
// `train` rebuilds both files from its current inputs every
// run; `evaluate` only loads them.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper, so the tokenizer JSON is written by
// hand and loaded back with Tokenizer::from_file.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::{NormalizedString, Normalizer, Tokenizer};

const WORDPIECE_FILE: &str = "wordpiece.json";
const WORDLEVEL_FILE: &str = "wordlevel.json";

/// Special tokens of a corpus-built WordPiece vocabulary, in id order.
const WORDPIECE_SPECIALS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    // ── Encoder path ──────────────────────────────────────────────────────────

    /// Build wordpiece.json from `vocab_file` / the corpus, replacing
    /// any earlier file.
    pub fn build_wordpiece(
        &self,
        texts:      &[String],
        vocab_file: Option<&Path>,
        vocab_size: usize,
    ) -> Result<Tokenizer> {
        let vocab = match vocab_file {
            Some(path) => {
                tracing::info!("Building WordPiece tokenizer from '{}'", path.display());
                read_vocab_file(path)?
            }
            None => {
                tracing::info!("Building WordPiece tokenizer from corpus (vocab_size={})", vocab_size);
                corpus_wordpiece_vocab(texts, vocab_size)
            }
        };

        let added: Vec<(u32, String)> = WORDPIECE_SPECIALS
            .iter()
            .filter_map(|t| vocab.get(*t).map(|&id| (id, t.to_string())))
            .collect();

        let model = json!({
            "type": "WordPiece",
            "unk_token": "[UNK]",
            "continuing_subword_prefix": "##",
            "max_input_chars_per_word": 100,
            "vocab": vocab_json(&vocab),
        });
        self.write_and_load(WORDPIECE_FILE, model, &added)
    }

    pub fn load_wordpiece(&self) -> Result<Tokenizer> {
        self.load(WORDPIECE_FILE)
    }

    // ── Recurrent path ────────────────────────────────────────────────────────

    /// Build wordlevel.json from `vector_words` (word-vector row order,
    /// row 0 reserved) / corpus frequencies, replacing any earlier file.
    pub fn build_word_level(
        &self,
        texts:        &[String],
        vector_words: Option<&[String]>,
        vocab_size:   usize,
    ) -> Result<Tokenizer> {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        vocab.insert("[UNK]".to_string(), 0);

        match vector_words {
            Some(words) => {
                tracing::info!("Building WordLevel tokenizer from {} word vectors", words.len());
                for (row, word) in words.iter().enumerate() {
                    vocab.entry(word.clone()).or_insert(row as u32 + 1);
                }
            }
            None => {
                tracing::info!("Building WordLevel tokenizer from corpus (vocab_size={})", vocab_size);
                for (word, _) in corpus_word_counts(texts).into_iter().take(vocab_size.saturating_sub(1)) {
                    let next = vocab.len() as u32;
                    vocab.entry(word).or_insert(next);
                }
            }
        }

        let model = json!({
            "type": "WordLevel",
            "unk_token": "[UNK]",
            "vocab": vocab_json(&vocab),
        });
        self.write_and_load(WORDLEVEL_FILE, model, &[(0, "[UNK]".to_string())])
    }

    pub fn load_word_level(&self) -> Result<Tokenizer> {
        self.load(WORDLEVEL_FILE)
    }

    // ── Shared ────────────────────────────────────────────────────────────────

    fn load(&self, file_name: &str) -> Result<Tokenizer> {
        let path = self.dir.join(file_name);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
    }

    /// Wrap `model` in the HuggingFace tokenizer JSON format, write it
    /// and load it back as a proper Tokenizer instance.
    fn write_and_load(&self, file_name: &str, model: Value, added: &[(u32, String)]) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let added_tokens: Vec<Value> = added
            .iter()
            .map(|(id, content)| json!({
                "id": id, "content": content, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": true,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "BertPreTokenizer"
            },
            "post_processor": null,
            "decoder": null,
            "model": model
        });

        let tok_path = self.dir.join(file_name);
        fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON '{}'", tok_path.display()))?;

        let tokenizer = self.load(file_name)?;
        tracing::info!(
            "Tokenizer built with {} entries, saved to '{}'",
            tokenizer.get_vocab_size(true),
            tok_path.display()
        );
        Ok(tokenizer)
    }
}

fn vocab_json(vocab: &HashMap<String, u32>) -> Value {
    let mut entries: Vec<(&String, &u32)> = vocab.iter().collect();
    entries.sort_by_key(|(_, &id)| id);
    let map: Map<String, Value> = entries
        .into_iter()
        .map(|(token, id)| (token.clone(), json!(id)))
        .collect();
    Value::Object(map)
}

/// BERT vocab.txt: one token per line, id = line number.
fn read_vocab_file(path: &Path) -> Result<HashMap<String, u32>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read vocabulary file '{}'", path.display()))?;
    let mut vocab = HashMap::new();
    for (id, line) in content.lines().enumerate() {
        let token = line.trim_end();
        if !token.is_empty() {
            vocab.entry(token.to_string()).or_insert(id as u32);
        }
    }
    Ok(vocab)
}

/// Split text the way BertNormalizer + BertPreTokenizer will.
fn pre_tokenize(text: &str) -> Vec<String> {
    let normalizer = BertNormalizer::new(true, true, Some(true), true);
    let mut normalized = NormalizedString::from(text);
    let text = match normalizer.normalize(&mut normalized) {
        Ok(()) => normalized.get().to_string(),
        Err(_) => text.to_lowercase(),
    };

    let mut out = Vec::new();
    for word in text.split_whitespace() {
        let mut current = String::new();
        for c in word.chars() {
            if c.is_ascii_punctuation() {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.push(c.to_string());
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

/// Corpus tokens sorted by frequency (descending), then alphabetically.
fn corpus_word_counts(texts: &[String]) -> Vec<(String, usize)> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in pre_tokenize(text) {
            *freq.entry(word).or_insert(0) += 1;
        }
    }
    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words
}

/// Specials, then every character in both forms, then frequent words.
fn corpus_wordpiece_vocab(texts: &[String], vocab_size: usize) -> HashMap<String, u32> {
    fn push(vocab: &mut HashMap<String, u32>, token: String) {
        let next = vocab.len() as u32;
        vocab.entry(token).or_insert(next);
    }

    let mut vocab: HashMap<String, u32> = HashMap::new();

    for special in WORDPIECE_SPECIALS {
        push(&mut vocab, special.to_string());
    }

    let words = corpus_word_counts(texts);
    let mut chars: Vec<char> = words.iter().flat_map(|(w, _)| w.chars()).collect();
    chars.sort_unstable();
    chars.dedup();
    for c in chars {
        push(&mut vocab, c.to_string());
        push(&mut vocab, format!("##{c}"));
    }

    for (word, _) in words {
        if vocab.len() >= vocab_size {
            break;
        }
        push(&mut vocab, word);
    }
    vocab
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::word_vectors::WordVectors;
    use tempfile::tempdir;

    fn corpus() -> Vec<String> {
        vec!["Café owners, café owners!".to_string(), "the river".to_string()]
    }

    #[test]
    fn test_pre_tokenize_splits_punctuation_and_strips_accents() {
        assert_eq!(pre_tokenize("Café owners,"), vec!["cafe", "owners", ","]);
    }

    #[test]
    fn test_word_level_reserves_zero_for_unknown() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        let tok   = store.build_word_level(&corpus(), None, 100).unwrap();
        assert_eq!(tok.token_to_id("[UNK]"), Some(0));
        assert!(tok.token_to_id("cafe").is_some());

        let enc = tok.encode("CAFÉ zebra", false).unwrap();
        assert_ne!(enc.get_ids()[0], 0);
        assert_eq!(enc.get_ids()[1], 0);
    }

    #[test]
    fn test_word_level_from_vectors_follows_row_order() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        let words = vec!["river".to_string(), "city".to_string()];
        let tok   = store.build_word_level(&[], Some(&words), 100).unwrap();
        assert_eq!(tok.token_to_id("river"), Some(1));
        assert_eq!(tok.token_to_id("city"), Some(2));
    }

    #[test]
    fn test_wordpiece_covers_unseen_words_with_pieces() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        let tok   = store.build_wordpiece(&corpus(), None, 1000).unwrap();
        assert_eq!(tok.token_to_id("[CLS]"), Some(2));

        // "river" is a whole word; "rive" only splits into pieces
        let enc = tok.encode("river rive", false).unwrap();
        assert_eq!(enc.get_tokens()[0], "river");
        assert!(enc.get_tokens().iter().all(|t| t != "[UNK]"));
    }

    #[test]
    fn test_wordpiece_from_vocab_file() {
        let dir   = tempdir().unwrap();
        let vocab = dir.path().join("vocab.txt");
        fs::write(&vocab, "[PAD]\n[UNK]\n[CLS]\n[SEP]\nriver\n##s\n").unwrap();

        let store = TokenizerStore::new(dir.path().join("tok").to_string_lossy().to_string());
        let tok   = store.build_wordpiece(&[], Some(&vocab), 0).unwrap();
        let enc   = tok.encode("rivers", false).unwrap();
        assert_eq!(enc.get_ids(), &[4, 5]);
    }

    #[test]
    fn test_reload_from_disk() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        store.build_word_level(&corpus(), None, 100).unwrap();
        let again = store.load_word_level().unwrap();
        assert!(again.token_to_id("river").is_some());
    }

    #[test]
    fn test_vector_build_replaces_earlier_corpus_vocabulary() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        store.build_word_level(&["zebra river city river".to_string()], None, 100).unwrap();

        let vectors = WordVectors::parse("city 1 0\nzebra 0 1\nriver 1 1\n").unwrap();
        let tok     = store.build_word_level(&[], Some(&vectors.words), 100).unwrap();
        for (row, word) in vectors.words.iter().enumerate() {
            assert_eq!(tok.token_to_id(word), Some(row as u32 + 1), "{word}");
        }

        // The saved file is the new one too
        let saved = store.load_word_level().unwrap();
        assert_eq!(saved.token_to_id("city"), Some(1));
    }

    #[test]
    fn test_second_corpus_build_drops_old_words() {
        let dir   = tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().to_string_lossy().to_string());
        store.build_word_level(&["harbour lighthouse".to_string()], None, 100).unwrap();
        let tok = store.build_word_level(&["guitar album".to_string()], None, 100).unwrap();
        assert!(tok.token_to_id("guitar").is_some());
        assert_eq!(tok.token_to_id("harbour"), None);
    }
}

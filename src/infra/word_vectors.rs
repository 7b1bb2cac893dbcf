// ============================================================
// Layer 6 — Word Vector Reader
// ============================================================
// Reads pretrained word vectors in the word2vec / GloVe text
// format:
//
//   [optional header]  <count> <dim>
//   <word> <v1> <v2> ... <v_dim>
//
// Row 0 of the resulting table is reserved (all zeros) for the
// unknown token, so the word on line k of the file, after the
// header and skipping duplicates, gets row k+1. The WordLevel
// tokenizer is built from `words` in the same order, which
// keeps token ids and embedding rows aligned.

use anyhow::{bail, Context, Result};
use std::{collections::HashSet, fs, path::Path};

#[derive(Debug, Clone, PartialEq)]
pub struct WordVectors {
    /// Words in row order; `words[i]` owns row `i + 1`.
    pub words:   Vec<String>,
    pub dim:     usize,
    /// Row-major `[words.len() + 1, dim]` table, row 0 zero.
    pub weights: Vec<f32>,
}

impl WordVectors {
    pub fn rows(&self) -> usize {
        self.words.len() + 1
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read word vectors from '{}'", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid word vector file '{}'", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty()).peekable();

        // ── Optional "<count> <dim>" header ───────────────────────────────────
        if let Some(first) = lines.peek() {
            let fields: Vec<&str> = first.split_whitespace().collect();
            if fields.len() == 2 && fields.iter().all(|f| f.parse::<usize>().is_ok()) {
                lines.next();
            }
        }

        let mut dim:     Option<usize> = None;
        let mut words:   Vec<String>   = Vec::new();
        let mut weights: Vec<f32>      = Vec::new();
        let mut seen:    HashSet<String> = HashSet::new();

        for (line_no, line) in lines.enumerate() {
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else { continue };
            let values = fields
                .map(str::parse::<f32>)
                .collect::<Result<Vec<f32>, _>>()
                .with_context(|| format!("Bad number on vector line {}", line_no + 1))?;

            let expected = *dim.get_or_insert(values.len());
            if expected == 0 {
                bail!("vector line {} has no components", line_no + 1);
            }
            if values.len() != expected {
                bail!(
                    "vector line {} has {} components, expected {}",
                    line_no + 1, values.len(), expected
                );
            }

            if !seen.insert(word.to_string()) {
                continue;
            }
            if words.is_empty() {
                weights.extend(std::iter::repeat(0.0).take(expected));
            }
            words.push(word.to_string());
            weights.extend(values);
        }

        let Some(dim) = dim else { bail!("no vectors found") };
        tracing::info!("Loaded {} word vectors of dimension {}", words.len(), dim);
        Ok(Self { words, dim, weights })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_skipped_and_row_zero_reserved() {
        let vectors = WordVectors::parse("2 3\nriver 1 2 3\ncity 4 5 6\n").unwrap();
        assert_eq!(vectors.words, vec!["river", "city"]);
        assert_eq!(vectors.dim, 3);
        assert_eq!(vectors.rows(), 3);
        assert_eq!(&vectors.weights[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&vectors.weights[3..6], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_without_header_and_duplicates() {
        let vectors = WordVectors::parse("a 0.5 0.5\nb 1 1\na 9 9\n").unwrap();
        assert_eq!(vectors.words, vec!["a", "b"]);
        assert_eq!(vectors.weights.len(), 6);
    }

    #[test]
    fn test_inconsistent_dimension_fails() {
        assert!(WordVectors::parse("a 1 2\nb 1\n").is_err());
        assert!(WordVectors::parse("").is_err());
    }
}

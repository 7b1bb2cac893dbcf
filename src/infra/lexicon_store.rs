// ============================================================
// Layer 6 — Lexicon Store
// ============================================================
// One UTF-8 text file per class, one phrase per line:
//
//   lexicons/
//     lexicon_0.txt
//     lexicon_1.txt
//     ...
//
// Every round overwrites all files. Lines of three characters
// or fewer are skipped on load.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::lexicon::Lexicon;
use crate::domain::traits::LexiconRepository;

/// Shortest line (in chars) that counts as a phrase on load.
const MIN_LINE_CHARS: usize = 4;

pub struct LexiconStore {
    dir: PathBuf,
}

impl LexiconStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    pub fn class_path(&self, class: usize) -> PathBuf {
        self.dir.join(format!("lexicon_{class}.txt"))
    }
}

impl LexiconRepository for LexiconStore {
    fn save(&self, lexicon: &Lexicon) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create lexicon directory '{}'", self.dir.display()))?;

        for class in 0..lexicon.n_classes() {
            let path     = self.class_path(class);
            let phrases  = lexicon.phrases(class);
            let mut body = phrases.join("\n");
            if !body.is_empty() {
                body.push('\n');
            }
            fs::write(&path, body)
                .with_context(|| format!("Cannot write lexicon '{}'", path.display()))?;

            if phrases.is_empty() {
                tracing::warn!("Lexicon for class {} is empty", class);
            } else {
                tracing::debug!("Wrote {} phrases to '{}'", phrases.len(), path.display());
            }
        }
        Ok(())
    }

    fn load(&self, n_classes: usize) -> Result<Lexicon> {
        let classes = (0..n_classes)
            .map(|class| {
                let path = self.class_path(class);
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("Cannot read lexicon '{}'", path.display()))?;
                Ok(text
                    .lines()
                    .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
                    .map(str::to_string)
                    .collect())
            })
            .collect::<Result<Vec<Vec<String>>>>()?;
        Ok(Lexicon::from_classes(classes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load() {
        let dir   = tempdir().unwrap();
        let store = LexiconStore::new(dir.path().to_string_lossy().to_string());
        let lexicon = Lexicon::from_classes(vec![
            vec!["river city bank".to_string(), "old stone bridge".to_string()],
            vec![],
        ]);
        store.save(&lexicon).unwrap();
        assert_eq!(store.load(2).unwrap(), lexicon);
    }

    #[test]
    fn test_short_lines_are_ignored() {
        let dir   = tempdir().unwrap();
        let store = LexiconStore::new(dir.path().to_string_lossy().to_string());
        fs::write(store.class_path(0), "abc\nriver city bank\n\nxy\n").unwrap();
        let lexicon = store.load(1).unwrap();
        assert_eq!(lexicon.phrases(0), &["river city bank".to_string()]);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir   = tempdir().unwrap();
        let store = LexiconStore::new(dir.path().to_string_lossy().to_string());
        assert!(store.load(1).is_err());
    }
}

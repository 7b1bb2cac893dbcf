// ============================================================
// Layer 4 — TSV Pool Files
// ============================================================
// Reads and writes the `label<TAB>text` files that hold the
// labeled, unlabeled, dev and test pools.
//
// Format:
//   - tab delimiter, no header row, no quoting
//   - column 0 = label (or the -1 marker), column 1 = text
//   - extra columns are ignored; fewer than 2 is fatal
//
// Round boundaries mutate two of these files:
//   labeled pool   ← accepted rows appended
//   unlabeled pool ← pending rows, full rewrite
//
// The rewrite is staged in `<file>.staged` and renamed over the
// pool only after the append succeeded, so a failed round boundary
// never leaves a row in both files.
//
// Reference: csv crate documentation (ReaderBuilder / WriterBuilder)

use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use crate::domain::error::SelfTrainError;
use crate::domain::example::{Example, LabeledExample, PoolRow};
use crate::domain::label_set::LabelSet;
use crate::domain::traits::{PoolSink, PoolSource};

/// One pool file on disk.
#[derive(Debug, Clone)]
pub struct TsvPool {
    path: PathBuf,
}

impl TsvPool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Rows with every label resolved against `labels`.
    pub fn read_labeled(&self, labels: &LabelSet) -> Result<Vec<LabeledExample>> {
        let rows = self.load_rows()?;
        LabeledExample::from_rows(&rows, labels)
            .with_context(|| format!("Invalid label in '{}'", self.path.display()))
    }

    /// Rows as unlabeled examples, markers preserved.
    pub fn read_unlabeled(&self, labels: &LabelSet) -> Result<Vec<Example>> {
        let rows = self.load_rows()?;
        Example::from_rows(&rows, labels)
            .with_context(|| format!("Invalid marker in '{}'", self.path.display()))
    }

    fn staged_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".staged");
        PathBuf::from(name)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
            }
        }
        Ok(())
    }

    fn write_with(&self, file: fs::File, rows: &[PoolRow]) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .from_writer(file);

        for row in rows {
            writer.write_record([sanitize_field(&row.marker), sanitize_field(&row.text)])?;
        }
        writer
            .flush()
            .with_context(|| format!("Cannot flush '{}'", self.path.display()))?;
        Ok(())
    }
}

impl PoolSource for TsvPool {
    fn load_rows(&self) -> Result<Vec<PoolRow>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open pool file '{}'", self.path.display()))?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Cannot read row {} of '{}'", i + 1, self.path.display()))?;

            match (record.get(0), record.get(1)) {
                (Some(marker), Some(text)) => rows.push(PoolRow::new(marker.trim(), text)),
                _ => {
                    return Err(SelfTrainError::MalformedRow {
                        path:   self.path.display().to_string(),
                        row:    i + 1,
                        reason: format!("expected label and text, found {} column(s)", record.len()),
                    }
                    .into())
                }
            }
        }

        tracing::debug!("Read {} rows from '{}'", rows.len(), self.path.display());
        Ok(rows)
    }
}

impl PoolSink for TsvPool {
    fn write_rows(&self, rows: &[PoolRow]) -> Result<()> {
        self.ensure_parent()?;
        let file = fs::File::create(&self.path)
            .with_context(|| format!("Cannot create pool file '{}'", self.path.display()))?;
        self.write_with(file, rows)?;
        tracing::debug!("Wrote {} rows to '{}'", rows.len(), self.path.display());
        Ok(())
    }

    fn append_rows(&self, rows: &[PoolRow]) -> Result<()> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open pool file '{}' for append", self.path.display()))?;
        self.write_with(file, rows)?;
        tracing::debug!("Appended {} rows to '{}'", rows.len(), self.path.display());
        Ok(())
    }

    fn stage_rows(&self, rows: &[PoolRow]) -> Result<()> {
        self.ensure_parent()?;
        let staged = self.staged_path();
        let file   = fs::File::create(&staged)
            .with_context(|| format!("Cannot create staged pool '{}'", staged.display()))?;
        self.write_with(file, rows)?;
        tracing::debug!("Staged {} rows in '{}'", rows.len(), staged.display());
        Ok(())
    }

    fn commit_staged(&self) -> Result<()> {
        let staged = self.staged_path();
        fs::rename(&staged, &self.path)
            .with_context(|| format!("Cannot move '{}' over '{}'", staged.display(), self.path.display()))
    }
}

/// Tabs and line breaks would split a field, so they become spaces.
fn sanitize_field(field: &str) -> String {
    field
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_append_keeps_order() {
        let dir  = tempdir().unwrap();
        let pool = TsvPool::new(dir.path().join("pool.tsv"));

        pool.write_rows(&[PoolRow::new("0", "first text")]).unwrap();
        pool.append_rows(&[PoolRow::new("1", "second \"quoted\" text")]).unwrap();

        let rows = pool.load_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], PoolRow::new("1", "second \"quoted\" text"));
    }

    #[test]
    fn test_rewrite_replaces_content() {
        let dir  = tempdir().unwrap();
        let pool = TsvPool::new(dir.path().join("nested").join("pool.tsv"));
        pool.write_rows(&[PoolRow::new("0", "a"), PoolRow::new("0", "b")]).unwrap();
        pool.write_rows(&[PoolRow::new("1", "c")]).unwrap();
        assert_eq!(pool.load_rows().unwrap(), vec![PoolRow::new("1", "c")]);
    }

    #[test]
    fn test_staged_rows_replace_pool_only_on_commit() {
        let dir  = tempdir().unwrap();
        let pool = TsvPool::new(dir.path().join("pool.tsv"));
        pool.write_rows(&[PoolRow::new("0", "old")]).unwrap();

        pool.stage_rows(&[PoolRow::new("1", "new")]).unwrap();
        assert_eq!(pool.load_rows().unwrap(), vec![PoolRow::new("0", "old")]);

        pool.commit_staged().unwrap();
        assert_eq!(pool.load_rows().unwrap(), vec![PoolRow::new("1", "new")]);
        assert!(!dir.path().join("pool.tsv.staged").exists());
    }

    #[test]
    fn test_commit_without_stage_fails() {
        let dir = tempdir().unwrap();
        assert!(TsvPool::new(dir.path().join("pool.tsv")).commit_staged().is_err());
    }

    #[test]
    fn test_tabs_in_text_are_flattened() {
        let dir  = tempdir().unwrap();
        let pool = TsvPool::new(dir.path().join("pool.tsv"));
        pool.write_rows(&[PoolRow::new("0", "a\tb\nc")]).unwrap();
        assert_eq!(pool.load_rows().unwrap()[0].text, "a b c");
    }

    #[test]
    fn test_single_column_row_is_malformed() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        fs::write(&path, "0\tfine\nbroken\n").unwrap();

        let err = TsvPool::new(&path).load_rows().unwrap_err();
        let err = err.downcast_ref::<SelfTrainError>().unwrap();
        assert!(matches!(err, SelfTrainError::MalformedRow { row: 2, .. }));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(TsvPool::new(dir.path().join("nope.tsv")).load_rows().is_err());
    }

    #[test]
    fn test_unknown_label_surfaces() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("pool.tsv");
        fs::write(&path, "0\tok\n9\tbad\n").unwrap();

        let labels = LabelSet::numeric(2).unwrap();
        let err    = TsvPool::new(&path).read_labeled(&labels).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SelfTrainError>(),
            Some(SelfTrainError::UnknownLabel { .. })
        ));
    }
}

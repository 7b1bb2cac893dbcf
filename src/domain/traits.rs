// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The engine never touches files or tokenizers directly. It
// talks to the outside through these traits:
//   - TsvPool       implements PoolSource + PoolSink
//   - LexiconStore  implements LexiconRepository
//   - TextEncoder   implements SurfaceTokenizer
//
// Tests swap in in-memory implementations.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::example::PoolRow;
use crate::domain::lexicon::Lexicon;

// ─── PoolSource ───────────────────────────────────────────────────────────────
/// Anything that yields the rows of a data pool.
pub trait PoolSource {
    fn load_rows(&self) -> Result<Vec<PoolRow>>;
}

// ─── PoolSink ─────────────────────────────────────────────────────────────────
/// Anything that can persist pool rows at a round boundary.
pub trait PoolSink {
    /// Replace the whole pool with `rows`.
    fn write_rows(&self, rows: &[PoolRow]) -> Result<()>;

    /// Add `rows` after the existing content.
    fn append_rows(&self, rows: &[PoolRow]) -> Result<()>;

    /// Write `rows` aside without touching the pool.
    fn stage_rows(&self, rows: &[PoolRow]) -> Result<()>;

    /// Replace the pool with the last staged rows.
    fn commit_staged(&self) -> Result<()>;
}

// ─── LexiconRepository ────────────────────────────────────────────────────────
/// Where per-class lexicons live between mining and pseudo-labeling.
pub trait LexiconRepository {
    /// Overwrite every class's phrase list.
    fn save(&self, lexicon: &Lexicon) -> Result<()>;

    /// Load `n_classes` phrase lists.
    fn load(&self, n_classes: usize) -> Result<Lexicon>;
}

// ─── SurfaceTokenizer ─────────────────────────────────────────────────────────
/// Recovers the surface string of every token position so that
/// attention indices can be mapped back to words.
pub trait SurfaceTokenizer {
    fn surface_tokens(&self, text: &str) -> Result<Vec<String>>;
}

// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises raw pool text and shapes token sequences for the
// two classifiers.
//
// Cleaning (applied in order):
//   1. Replace tabs, Unicode spaces and control characters
//      (line breaks included) with a plain space
//   2. Collapse runs of spaces into one
//   3. Trim both ends
//
// Pool text is one line per example, so unlike document text
// there are no paragraph breaks to keep.
//
// Sequence shaping:
//   truncate_pair — drop tokens from the longer segment until
//                   the pair fits the budget
//   pad_to        — right-pad with zeros up to max_len
//
// Reference: Rust Book §8 (Strings in Rust)
//            Devlin et al. (2019) BERT, input representation

pub struct Preprocessor;

impl Preprocessor {
    /// Create a new Preprocessor instance
    pub fn new() -> Self {
        Self
    }

    /// Clean one pool text into a single normalised line.
    pub fn clean(&self, text: &str) -> String {

        // ── Step 1: Normalise individual characters ───────────────────────────
        let step1: String = text
            .chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect();

        // ── Step 2: Collapse repeated spaces ──────────────────────────────────
        let mut out        = String::with_capacity(step1.len());
        let mut last_space = false;
        for c in step1.chars() {
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        // ── Step 3: Trim ──────────────────────────────────────────────────────
        out.trim().to_string()
    }
}

/// Implement Default so Preprocessor can be created with Preprocessor::default()
impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Shrink `a` and `b` until `a.len() + b.len() <= budget`, always
/// removing the last token of whichever segment is currently longer
/// (`b` on a tie).
pub fn truncate_pair<T>(a: &mut Vec<T>, b: &mut Vec<T>, budget: usize) {
    while a.len() + b.len() > budget {
        if a.len() > b.len() {
            a.pop();
        } else {
            b.pop();
        }
    }
}

/// Right-pad `seq` with zeros up to `max_len` (or cut it down to it).
pub fn pad_to(mut seq: Vec<u32>, max_len: usize) -> Vec<u32> {
    seq.truncate(max_len);
    seq.resize(max_len, 0);
    seq
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_line_breaks_and_tabs_become_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("line1\r\n\tline2"), "line1 line2");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  "), "");
    }

    #[test]
    fn test_truncate_removes_from_longer_segment() {
        let mut a: Vec<u32> = (0..10).collect();
        let mut b: Vec<u32> = (0..3).collect();
        truncate_pair(&mut a, &mut b, 8);
        // the shorter segment is untouched while the longer still dominates
        assert_eq!(b.len(), 3);
        assert_eq!(a.len(), 5);
        assert_eq!(a, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_truncate_alternates_once_balanced() {
        let mut a: Vec<u32> = (0..6).collect();
        let mut b: Vec<u32> = (0..6).collect();
        truncate_pair(&mut a, &mut b, 7);
        assert_eq!(a.len() + b.len(), 7);
        assert_eq!((a.len(), b.len()), (4, 3));
    }

    #[test]
    fn test_truncate_noop_within_budget() {
        let mut a = vec![1u32, 2];
        let mut b = Vec::new();
        truncate_pair(&mut a, &mut b, 5);
        assert_eq!(a, vec![1, 2]);
    }

    #[test]
    fn test_pad_to_fills_with_zero() {
        assert_eq!(pad_to(vec![5, 6], 4), vec![5, 6, 0, 0]);
        assert_eq!(pad_to(vec![1, 2, 3], 2), vec![1, 2]);
    }
}

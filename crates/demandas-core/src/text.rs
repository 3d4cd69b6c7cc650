//! Text folding and edit distance for hand-typed spreadsheet labels.
//!
//! The same team or status shows up in many spellings ("Júlio", " julio ",
//! "EQUIPE_JULIO"). Folding maps them onto one comparable key:
//!
//! - Unicode NFKD decomposition, combining marks dropped (accents, cedilla)
//! - Uppercase
//! - `_`, `-`, `/` and runs of whitespace collapsed to a single space
//! - Leading and trailing separators trimmed

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Fold a label into its case/accent-insensitive comparison key.
///
/// Input: "  Em   análise " → "EM ANALISE", "pending_active" → "PENDING ACTIVE"
pub fn fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for c in s.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_whitespace() || matches!(c, '_' | '-' | '/') {
            // Only emit a separator once something precedes it.
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.extend(c.to_uppercase());
    }

    out
}

/// Levenshtein distance between two strings, counted in chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Whether `a` and `b` are at most `max` edits apart.
///
/// Skips the full computation when the length gap alone exceeds `max`.
pub fn within_distance(a: &str, b: &str, max: usize) -> bool {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la.abs_diff(lb) > max {
        return false;
    }
    edit_distance(a, b) <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("Júlio"), "JULIO");
        assert_eq!(fold("situação"), "SITUACAO");
        assert_eq!(fold("EM ANÁLISE"), "EM ANALISE");
    }

    #[test]
    fn fold_collapses_separators() {
        assert_eq!(fold("  Em   análise "), "EM ANALISE");
        assert_eq!(fold("pending_active"), "PENDING ACTIVE");
        assert_eq!(fold("ATIVO/RECEPTIVO"), "ATIVO RECEPTIVO");
        assert_eq!(fold("resolution-time__minutes"), "RESOLUTION TIME MINUTES");
    }

    #[test]
    fn fold_empty_and_separator_only() {
        assert_eq!(fold(""), "");
        assert_eq!(fold(" _-/ "), "");
    }

    #[test]
    fn distance_exact_values() {
        assert_eq!(edit_distance("JULIO", "JULIO"), 0);
        assert_eq!(edit_distance("JULHO", "JULIO"), 1);
        assert_eq!(edit_distance("JULIO", "JULI"), 1);
        assert_eq!(edit_distance("LEANDRO", "LANDRO"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "ABC"), 3);
        assert_eq!(edit_distance("ABC", ""), 3);
    }

    #[test]
    fn distance_is_symmetric() {
        assert_eq!(
            edit_distance("ADRIANO", "ADRIANA"),
            edit_distance("ADRIANA", "ADRIANO")
        );
    }

    #[test]
    fn within_distance_short_circuits_on_length() {
        assert!(within_distance("JULHO", "JULIO", 1));
        assert!(!within_distance("UNKNOWN TEAM X", "JULIO", 1));
        assert!(!within_distance("JU", "JULIO", 1));
    }
}

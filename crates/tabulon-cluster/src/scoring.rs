//! Pairwise header similarity (spec.md §4.E):
//! `0.5 * levenshtein_ratio + 0.3 * ngram_jaccard(trigrams) + 0.2 * token_overlap`,
//! gated by type-profile compatibility — two columns with incompatible
//! dominant types never edge together regardless of name similarity.

use std::collections::HashSet;

use tabulon_types::ColumnType;

use crate::normalize::tokens;

const LEVENSHTEIN_WEIGHT: f64 = 0.5;
const TRIGRAM_WEIGHT: f64 = 0.3;
const TOKEN_WEIGHT: f64 = 0.2;

fn trigrams(s: &str) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 3 {
        return [s.to_string()].into_iter().collect();
    }
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// `true` unless the two dominant column types are clearly incompatible
/// (e.g. `Numeric` vs `Bool`). `Text` is permissive: headers of otherwise
/// unparsed/freeform columns never get vetoed purely on type.
#[must_use]
pub fn types_compatible(a: ColumnType, b: ColumnType) -> bool {
    if a == b {
        return true;
    }
    matches!(a, ColumnType::Text) || matches!(b, ColumnType::Text)
}

/// Weighted similarity between two already-normalized header strings, in
/// `[0.0, 1.0]`.
#[must_use]
pub fn similarity(a_normalized: &str, b_normalized: &str) -> f64 {
    if a_normalized.is_empty() && b_normalized.is_empty() {
        return 1.0;
    }

    let lev = strsim::normalized_levenshtein(a_normalized, b_normalized);

    let a_tri = trigrams(a_normalized);
    let b_tri = trigrams(b_normalized);
    let tri = jaccard(&a_tri, &b_tri);

    let a_tok: HashSet<&str> = tokens(a_normalized).into_iter().collect();
    let b_tok: HashSet<&str> = tokens(b_normalized).into_iter().collect();
    let tok = jaccard(&a_tok, &b_tok);

    LEVENSHTEIN_WEIGHT * lev + TRIGRAM_WEIGHT * tri + TOKEN_WEIGHT * tok
}

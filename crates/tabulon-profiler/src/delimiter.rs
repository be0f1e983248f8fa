//! Delimiter detection (spec.md §4.C): for each candidate in
//! `Delimiter::CANDIDATES`, count its per-line occurrences across the
//! sample and take the modal count's consistency (how many lines hit that
//! mode). The candidate with the highest consistency wins; ties break by
//! the candidates' declared priority order (`,` > `;` > `\t` > `|`).

use std::collections::HashMap;
use tabulon_types::Delimiter;

/// Pick the best-fit delimiter for a sample of raw (undecoded-into-fields)
/// lines. Returns `Delimiter::Comma` if the sample is empty or no candidate
/// ever appears — comma is the fallback, not a detected result.
#[must_use]
pub fn detect_delimiter(lines: &[String]) -> Delimiter {
    let non_empty: Vec<&String> = lines.iter().filter(|l| !l.is_empty()).collect();
    if non_empty.is_empty() {
        return Delimiter::Comma;
    }

    let mut best: Option<(Delimiter, usize)> = None;
    for candidate in Delimiter::CANDIDATES {
        let ch = candidate.as_char();
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for line in &non_empty {
            let n = line.matches(ch).count();
            *counts.entry(n).or_insert(0) += 1;
        }
        // The mode at count 0 means "this delimiter barely appears"; skip it
        // unless it's the only candidate with any signal at all.
        let modal = counts
            .iter()
            .filter(|(&count, _)| count > 0)
            .max_by_key(|(_, &consistency)| consistency)
            .map(|(_, &consistency)| consistency)
            .unwrap_or(0);

        if modal == 0 {
            continue;
        }
        match best {
            Some((_, best_consistency)) if modal <= best_consistency => {}
            _ => best = Some((candidate, modal)),
        }
    }

    best.map(|(d, _)| d).unwrap_or(Delimiter::Comma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_comma() {
        let lines = vec!["a,b,c".to_string(), "1,2,3".to_string(), "4,5,6".to_string()];
        assert_eq!(detect_delimiter(&lines), Delimiter::Comma);
    }

    #[test]
    fn detects_semicolon_when_dominant() {
        let lines = vec!["a;b;c".to_string(), "1;2;3".to_string()];
        assert_eq!(detect_delimiter(&lines), Delimiter::Semicolon);
    }

    #[test]
    fn detects_tab() {
        let lines = vec!["a\tb\tc".to_string(), "1\t2\t3".to_string()];
        assert_eq!(detect_delimiter(&lines), Delimiter::Tab);
    }

    #[test]
    fn ties_break_toward_comma() {
        // Equal consistency for comma and semicolon: comma wins by priority.
        let lines = vec!["a,b;c".to_string(), "1,2;3".to_string()];
        assert_eq!(detect_delimiter(&lines), Delimiter::Comma);
    }

    #[test]
    fn empty_sample_defaults_to_comma() {
        assert_eq!(detect_delimiter(&[]), Delimiter::Comma);
    }
}

//! Header-row detection (spec.md §4.C): a candidate first row is treated as
//! a header when at least `header_nontext_ratio` of its cells are both
//! non-numeric and distinct from any value seen in that column across the
//! body sample — i.e. it reads like a label, not a recurring data value.

fn is_numeric_like(cell: &str) -> bool {
    let trimmed = cell.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

/// Decide whether `candidate` (the first row read) is a header, given a
/// sample of subsequent body rows and the configured non-text ratio.
#[must_use]
pub fn looks_like_header(candidate: &[String], body_sample: &[Vec<String>], nontext_ratio: f64) -> bool {
    if candidate.is_empty() {
        return false;
    }

    let qualifying = candidate
        .iter()
        .enumerate()
        .filter(|(i, cell)| {
            let nontext = !is_numeric_like(cell);
            let distinct_from_body = !body_sample
                .iter()
                .any(|row| row.get(*i).is_some_and(|v| v.eq_ignore_ascii_case(cell)));
            nontext && distinct_from_body
        })
        .count();

    (qualifying as f64 / candidate.len() as f64) >= nontext_ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_labels_distinct_from_body_are_a_header() {
        let candidate = vec!["name".to_string(), "age".to_string(), "city".to_string()];
        let body = vec![
            vec!["Alice".to_string(), "30".to_string(), "NYC".to_string()],
            vec!["Bob".to_string(), "41".to_string(), "LA".to_string()],
        ];
        assert!(looks_like_header(&candidate, &body, 0.7));
    }

    #[test]
    fn all_numeric_first_row_is_not_a_header() {
        let candidate = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let body = vec![vec!["4".to_string(), "5".to_string(), "6".to_string()]];
        assert!(!looks_like_header(&candidate, &body, 0.7));
    }

    #[test]
    fn label_recurring_in_body_does_not_count_as_header_evidence() {
        // "status" appears verbatim as a data value too, so it's not distinct.
        let candidate = vec!["status".to_string(), "99".to_string()];
        let body = vec![
            vec!["status".to_string(), "1".to_string()],
            vec!["status".to_string(), "2".to_string()],
        ];
        assert!(!looks_like_header(&candidate, &body, 0.7));
    }

    #[test]
    fn empty_candidate_is_never_a_header() {
        assert!(!looks_like_header(&[], &[], 0.7));
    }
}

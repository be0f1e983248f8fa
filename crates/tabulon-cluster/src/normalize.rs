//! Header normalization (spec.md §4.E): casefold, Unicode-normalize, fold a
//! handful of Cyrillic/Latin homoglyphs to their Latin look-alike, strip
//! punctuation, and collapse separators — so `"Customer_Name"`, `"customer
//! name"`, and a Cyrillic-homoglyph `"сustomer-nаme"` normalize identically.

use unicode_normalization::UnicodeNormalization;

/// Cyrillic letters visually indistinguishable from a Latin counterpart in
/// most header text, mapped to that counterpart.
const HOMOGLYPHS: &[(char, char)] = &[
    ('а', 'a'),
    ('е', 'e'),
    ('о', 'o'),
    ('р', 'p'),
    ('с', 'c'),
    ('х', 'x'),
    ('у', 'y'),
    ('і', 'i'),
    ('ѕ', 's'),
    ('А', 'A'),
    ('В', 'B'),
    ('Е', 'E'),
    ('К', 'K'),
    ('М', 'M'),
    ('Н', 'H'),
    ('О', 'O'),
    ('Р', 'P'),
    ('С', 'C'),
    ('Т', 'T'),
    ('Х', 'X'),
];

fn fold_homoglyph(c: char) -> char {
    HOMOGLYPHS
        .iter()
        .find(|(from, _)| *from == c)
        .map_or(c, |(_, to)| *to)
}

/// Normalize a raw header string into a comparison key: NFKC-normalized,
/// homoglyph-folded, lowercased, with non-alphanumeric runs collapsed to a
/// single space and trimmed.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    let folded: String = raw.nfkc().map(fold_homoglyph).collect();
    let lowered = folded.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut last_was_sep = true;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push(' ');
            last_was_sep = true;
        }
    }
    out.trim_end().to_string()
}

/// Split a normalized header into its whitespace-delimited tokens.
#[must_use]
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_and_separators() {
        assert_eq!(normalize_header("Customer_Name"), "customer name");
        assert_eq!(normalize_header("customer-name"), "customer name");
    }

    #[test]
    fn folds_cyrillic_homoglyphs_to_latin() {
        // "с" (U+0441), "а" (U+0430) look like Latin c, a.
        let cyrillic_ish = "сustomer nаme";
        assert_eq!(normalize_header(cyrillic_ish), "customer name");
    }

    #[test]
    fn collapses_repeated_punctuation() {
        assert_eq!(normalize_header("zip__code!!"), "zip code");
    }

    #[test]
    fn tokens_split_on_whitespace() {
        assert_eq!(tokens("customer name"), vec!["customer", "name"]);
    }
}

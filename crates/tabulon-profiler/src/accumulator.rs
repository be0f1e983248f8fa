//! Per-column streaming accumulation (spec.md §4.C): classifies each cell
//! into the coarse type lattice, folds it into an HLL-lite distinct-count
//! register bank, tracks a bounded top-k sketch, and keeps running min/max
//! and a capped sample.

use once_cell::sync::Lazy;
use regex::Regex;
use tabulon_types::{ColumnProfile, ColumnType, TopKSketch};

const NULL_SENTINELS: &[&str] = &["", "null", "na", "n/a", "nil", "none"];

static DATE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$|^\d{2}/\d{2}/\d{4}$|^\d{2}-\d{2}-\d{4}$").unwrap()
});

fn is_null(cell: &str) -> bool {
    NULL_SENTINELS.contains(&cell.trim().to_ascii_lowercase().as_str())
}

fn classify(cell: &str) -> ColumnType {
    let trimmed = cell.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        return ColumnType::Bool;
    }
    if DATE_LIKE.is_match(trimmed)
        && (chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok()
            || chrono::NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").is_ok()
            || chrono::NaiveDate::parse_from_str(trimmed, "%d-%m-%Y").is_ok())
    {
        return ColumnType::Date;
    }
    if trimmed.parse::<f64>().is_ok() {
        return ColumnType::Numeric;
    }
    ColumnType::Text
}

fn hll_observe(register: &mut [u8; 64], value: &str) {
    let hash = xxhash_rust::xxh3::xxh3_64(value.as_bytes());
    let index = (hash >> 58) as usize; // top 6 bits select one of 64 registers
    let rest = hash << 6;
    let rank = (rest.leading_zeros() + 1) as u8;
    if rank > register[index] {
        register[index] = rank;
    }
}

/// Streaming accumulator wrapping a [`ColumnProfile`] plus the sketch
/// structures too transient to serialize (rebuilt from scratch per block).
pub struct ColumnAccumulator {
    profile: ColumnProfile,
    sketch: TopKSketch,
    sample_values_cap: usize,
}

impl ColumnAccumulator {
    #[must_use]
    pub fn new(name: Option<String>, sketch_cap: usize, sample_values_cap: usize) -> Self {
        Self {
            profile: ColumnProfile::new(name),
            sketch: TopKSketch::new(sketch_cap),
            sample_values_cap,
        }
    }

    pub fn observe(&mut self, raw: &str) {
        if is_null(raw) {
            self.profile.nulls += 1;
            self.profile.type_hist.null += 1;
            return;
        }

        self.profile.non_nulls += 1;
        match classify(raw) {
            ColumnType::Numeric => self.profile.type_hist.numeric += 1,
            ColumnType::Date => self.profile.type_hist.date += 1,
            ColumnType::Bool => self.profile.type_hist.bool_ += 1,
            ColumnType::Text => self.profile.type_hist.text += 1,
        }

        hll_observe(&mut self.profile.hll_register, raw);
        self.sketch.observe(raw);

        match &self.profile.min {
            Some(min) if min.as_str() <= raw => {}
            _ => self.profile.min = Some(raw.to_string()),
        }
        match &self.profile.max {
            Some(max) if max.as_str() >= raw => {}
            _ => self.profile.max = Some(raw.to_string()),
        }

        if self.profile.sample_values.len() < self.sample_values_cap {
            self.profile.sample_values.push(raw.to_string());
        }
    }

    #[must_use]
    pub fn finalize(mut self) -> ColumnProfile {
        self.profile.top_k = self.sketch.top_k(self.sample_values_cap);
        self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_numeric_date_bool_text() {
        assert_eq!(classify("42"), ColumnType::Numeric);
        assert_eq!(classify("3.14"), ColumnType::Numeric);
        assert_eq!(classify("2024-01-15"), ColumnType::Date);
        assert_eq!(classify("true"), ColumnType::Bool);
        assert_eq!(classify("hello"), ColumnType::Text);
    }

    #[test]
    fn null_sentinels_are_recognized() {
        assert!(is_null(""));
        assert!(is_null("NULL"));
        assert!(is_null("n/a"));
        assert!(!is_null("0"));
    }

    #[test]
    fn accumulator_tracks_min_max_and_nulls() {
        let mut acc = ColumnAccumulator::new(Some("x".into()), 16, 8);
        acc.observe("banana");
        acc.observe("apple");
        acc.observe("cherry");
        acc.observe("");
        let profile = acc.finalize();
        assert_eq!(profile.min.as_deref(), Some("apple"));
        assert_eq!(profile.max.as_deref(), Some("cherry"));
        assert_eq!(profile.nulls, 1);
        assert_eq!(profile.non_nulls, 3);
    }

    #[test]
    fn distinct_values_yield_positive_unique_estimate() {
        let mut acc = ColumnAccumulator::new(None, 16, 8);
        for i in 0..200 {
            acc.observe(&format!("value-{i}"));
        }
        let profile = acc.finalize();
        assert!(profile.estimate_unique() > 0.0);
    }
}

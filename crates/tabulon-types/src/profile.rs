use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Distribution of detected cell types within a column, as running counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeHistogram {
    pub numeric: u64,
    pub date: u64,
    pub bool_: u64,
    pub text: u64,
    pub null: u64,
}

impl TypeHistogram {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.numeric + self.date + self.bool_ + self.text + self.null
    }

    /// The type with the largest share of non-null observations.
    #[must_use]
    pub fn dominant(&self) -> ColumnType {
        let candidates = [
            (ColumnType::Numeric, self.numeric),
            (ColumnType::Date, self.date),
            (ColumnType::Bool, self.bool_),
            (ColumnType::Text, self.text),
        ];
        candidates
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map_or(ColumnType::Text, |(ty, _)| ty)
    }

    /// Fraction of observations that land outside the dominant type, excluding nulls.
    #[must_use]
    pub fn disagreement_ratio(&self) -> f64 {
        let non_null = self.total().saturating_sub(self.null);
        if non_null == 0 {
            return 0.0;
        }
        let dominant_count = match self.dominant() {
            ColumnType::Numeric => self.numeric,
            ColumnType::Date => self.date,
            ColumnType::Bool => self.bool_,
            ColumnType::Text => self.text,
        };
        1.0 - (dominant_count as f64 / non_null as f64)
    }
}

/// Coarse type lattice used throughout analysis, clustering and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Date,
    Bool,
    Text,
}

/// A single entry in the top-k frequency sketch for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKEntry {
    pub value: String,
    pub count: u64,
}

/// Streaming per-column statistics accumulated by the Signature & Column Profiler.
///
/// `hll_register` gives a HyperLogLog-lite distinct-count estimate (<=5% error
/// at >=1% of stream, per the profiler's accuracy budget); it is not a bitmap
/// of raw values, just 64 leading-zero-run registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: Option<String>,
    pub nulls: u64,
    pub non_nulls: u64,
    pub hll_register: [u8; 64],
    /// Bounded to `sample_values_cap` (profile-driven), evicting the lowest-count entry.
    pub top_k: Vec<TopKEntry>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub type_hist: TypeHistogram,
    pub sample_values: Vec<String>,
}

impl ColumnProfile {
    #[must_use]
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            nulls: 0,
            non_nulls: 0,
            hll_register: [0; 64],
            top_k: Vec::new(),
            min: None,
            max: None,
            type_hist: TypeHistogram::default(),
            sample_values: Vec::new(),
        }
    }

    /// Estimated distinct count from the HLL-lite register bank.
    #[must_use]
    pub fn estimate_unique(&self) -> f64 {
        const M: f64 = 64.0;
        const ALPHA_M: f64 = 0.709; // bias-correction constant for m = 64 buckets

        let sum: f64 = self
            .hll_register
            .iter()
            .map(|&r| 2f64.powi(-(r as i32)))
            .sum();
        if sum == 0.0 {
            return 0.0;
        }
        ALPHA_M * M * M / sum
    }

    /// Null ratio over all observed cells (nulls + non-nulls).
    #[must_use]
    pub fn null_ratio(&self) -> f64 {
        let total = self.nulls + self.non_nulls;
        if total == 0 {
            0.0
        } else {
            self.nulls as f64 / total as f64
        }
    }
}

/// A schema's detected shape for one block: delimiter, header sample, column count/types.
///
/// Invariant: `column_types.len() == column_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSignature {
    pub delimiter: crate::ids::Delimiter,
    pub header_sample: Vec<String>,
    pub column_count: usize,
    pub column_types: Vec<ColumnType>,
}

impl SchemaSignature {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.column_types.len() == self.column_count
    }
}

/// Width of the count-min-style overflow row used to approximate the
/// frequency of values that fall out of the tracked top-`cap` set.
const OVERFLOW_WIDTH: usize = 256;

/// Frequency sketch used by the profiler to retain an approximate top-k set
/// without storing the full value multiset. Values within the tracked set
/// keep exact counts; once the cap is reached, a single-row count-min sketch
/// tracks approximate counts for everything else, and a tracked entry is
/// only evicted once an overflowing value's approximate count exceeds it.
#[derive(Debug)]
pub struct TopKSketch {
    cap: usize,
    counts: HashMap<String, u64>,
    overflow: Vec<u64>,
}

impl Default for TopKSketch {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TopKSketch {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            counts: HashMap::new(),
            overflow: vec![0; OVERFLOW_WIDTH],
        }
    }

    fn overflow_bucket(value: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        (hasher.finish() as usize) % OVERFLOW_WIDTH
    }

    pub fn observe(&mut self, value: &str) {
        if let Some(c) = self.counts.get_mut(value) {
            *c += 1;
            return;
        }
        if self.counts.len() < self.cap {
            self.counts.insert(value.to_string(), 1);
            return;
        }
        let bucket = Self::overflow_bucket(value);
        self.overflow[bucket] += 1;
        let approx_count = self.overflow[bucket] + 1;

        if let Some((min_key, &min_count)) = self.counts.iter().min_by_key(|(_, c)| **c) {
            if approx_count > min_count {
                let min_key = min_key.clone();
                self.counts.remove(&min_key);
                self.counts.insert(value.to_string(), approx_count);
            }
        }
    }

    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<TopKEntry> {
        let mut entries: Vec<TopKEntry> = self
            .counts
            .iter()
            .map(|(value, &count)| TopKEntry {
                value: value.clone(),
                count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        entries.truncate(k);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_type_picks_majority() {
        let hist = TypeHistogram {
            numeric: 90,
            date: 0,
            bool_: 0,
            text: 10,
            null: 0,
        };
        assert_eq!(hist.dominant(), ColumnType::Numeric);
        assert!((hist.disagreement_ratio() - 0.10).abs() < 1e-9);
    }

    #[test]
    fn empty_histogram_has_zero_disagreement() {
        let hist = TypeHistogram::default();
        assert_eq!(hist.disagreement_ratio(), 0.0);
    }

    #[test]
    fn top_k_sketch_orders_by_frequency_then_value() {
        let mut sketch = TopKSketch::new(16);
        for _ in 0..3 {
            sketch.observe("a");
        }
        for _ in 0..5 {
            sketch.observe("b");
        }
        sketch.observe("c");
        let top = sketch.top_k(2);
        assert_eq!(top[0].value, "b");
        assert_eq!(top[1].value, "a");
    }

    #[test]
    fn empty_hll_register_estimates_zero() {
        let profile = ColumnProfile::new(Some("id".to_string()));
        assert_eq!(profile.estimate_unique(), 0.0);
    }
}

//! Sampling Planner (spec.md §4.A).
//!
//! Deterministically picks a strictly increasing sequence of line indices to
//! sample, given `total_lines` and `min_gap`: start with `{0, total_lines-1}`
//! and iteratively insert midpoints into any interval wider than `min_gap`,
//! terminating when no interval exceeds it. Complexity is `O(m log m)` with
//! `m` the number of sampled indices, not `total_lines`.

use std::collections::BTreeSet;

/// One sampled block: a clipped `[start_line, end_line)` line range. Its
/// byte-offset span is computed separately, once per file, by
/// `streamer::locate_block_offsets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBlock {
    pub start_line: u64,
    pub end_line: u64,
}

/// Produce the deterministic sample-index sequence for a file of
/// `total_lines` lines, given a minimum acceptable gap between consecutive
/// samples.
#[must_use]
pub fn sample_indices(total_lines: u64, min_gap: u64) -> Vec<u64> {
    if total_lines == 0 {
        return Vec::new();
    }
    if total_lines == 1 {
        return vec![0];
    }

    let mut points: BTreeSet<u64> = BTreeSet::new();
    points.insert(0);
    points.insert(total_lines - 1);

    let min_gap = min_gap.max(1);

    loop {
        let snapshot: Vec<u64> = points.iter().copied().collect();
        let mut inserted_any = false;
        for window in snapshot.windows(2) {
            let (a, b) = (window[0], window[1]);
            if b - a > min_gap {
                let mid = a + (b - a) / 2;
                if mid != a && mid != b && points.insert(mid) {
                    inserted_any = true;
                }
            }
        }
        if !inserted_any {
            break;
        }
    }

    points.into_iter().collect()
}

/// Map a sample-index sequence to blocks of `block_size` lines, clipped to
/// `total_lines` and with adjacent overlapping blocks merged into one.
#[must_use]
pub fn blocks_from_indices(indices: &[u64], block_size: u64, total_lines: u64) -> Vec<PlannedBlock> {
    let block_size = block_size.max(1);
    let raw: Vec<PlannedBlock> = indices
        .iter()
        .map(|&start| {
            let end = (start + block_size).min(total_lines);
            PlannedBlock {
                start_line: start,
                end_line: end,
            }
        })
        .collect();

    let mut merged: Vec<PlannedBlock> = Vec::new();
    for block in raw {
        match merged.last_mut() {
            Some(prev) if block.start_line <= prev.end_line => {
                prev.end_line = prev.end_line.max(block.end_line);
            }
            _ => merged.push(block),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn contains_first_and_last_line() {
        let idx = sample_indices(1000, 50);
        assert_eq!(*idx.first().unwrap(), 0);
        assert_eq!(*idx.last().unwrap(), 999);
    }

    #[test]
    fn every_adjacent_gap_is_within_min_gap() {
        let idx = sample_indices(1000, 50);
        for window in idx.windows(2) {
            assert!(window[1] - window[0] <= 50);
        }
    }

    #[test]
    fn single_line_file_yields_single_index() {
        assert_eq!(sample_indices(1, 10), vec![0]);
    }

    #[test]
    fn empty_file_yields_no_indices() {
        assert_eq!(sample_indices(0, 10), Vec::<u64>::new());
    }

    #[test]
    fn is_deterministic_across_runs() {
        let a = sample_indices(123_456, 777);
        let b = sample_indices(123_456, 777);
        assert_eq!(a, b);
    }

    #[test]
    fn overlapping_blocks_are_merged() {
        let blocks = blocks_from_indices(&[0, 5, 100], 20, 1000);
        // 0..20 and 5..25 overlap and merge into 0..25; 100..120 stays separate.
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].start_line, 0);
        assert_eq!(blocks[0].end_line, 25);
        assert_eq!(blocks[1].start_line, 100);
    }

    #[test]
    fn blocks_are_clipped_to_file_length() {
        let blocks = blocks_from_indices(&[990], 50, 1000);
        assert_eq!(blocks[0].end_line, 1000);
    }

    proptest! {
        #[test]
        fn sampling_determinism_property(total_lines in 2u64..50_000, min_gap in 1u64..5000) {
            let a = sample_indices(total_lines, min_gap);
            let b = sample_indices(total_lines, min_gap);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(*a.first().unwrap(), 0);
            prop_assert_eq!(*a.last().unwrap(), total_lines - 1);
            for window in a.windows(2) {
                prop_assert!(window[1] - window[0] <= min_gap);
            }
        }
    }
}

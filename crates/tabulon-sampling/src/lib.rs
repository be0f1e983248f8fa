//! Deterministic block sampling and chunked line streaming (spec.md §4.A,
//! §4.B): the Sampling Planner picks which line ranges to inspect without
//! reading the whole file, and the Line Counter & Block Streamer turns a
//! planned block into decoded content bounded to a fixed resident buffer.

pub mod planner;
pub mod streamer;

pub use planner::{blocks_from_indices, sample_indices, PlannedBlock};
pub use streamer::{count_lines, for_each_line, locate_block_offsets, read_block, read_block_at, DecodedLine, RawBlock};

use tabulon_error::TabulonError;
use std::path::Path;

/// Plan and materialize every sampled block for a file in one call: count
/// lines, derive sample indices from `min_gap`, map to `block_size`-line
/// blocks, locate each block's byte span in a single pass, and read each
/// block by seeking straight to it.
pub fn plan_and_read_blocks(
    path: &Path,
    min_gap: u64,
    block_size: u64,
) -> Result<Vec<(PlannedBlock, RawBlock)>, TabulonError> {
    let total_lines = count_lines(path)?;
    let indices = sample_indices(total_lines, min_gap);
    let blocks = blocks_from_indices(&indices, block_size, total_lines);
    let offsets = locate_block_offsets(path, &blocks)?;
    blocks
        .into_iter()
        .zip(offsets)
        .map(|(block, byte_span)| {
            let raw = read_block_at(path, &block, byte_span)?;
            Ok((block, raw))
        })
        .collect()
}

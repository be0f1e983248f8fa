//! Line Counter & Block Streamer (spec.md §4.B).
//!
//! Counts lines and extracts sampled blocks from a file in 1 MiB chunks
//! without holding the whole file resident: each block's decoded content is
//! capped at [`BLOCK_BYTE_CAP`] bytes, past which lines are still counted but
//! not retained. Decoding tries UTF-8 first and falls back to Windows-1251
//! with a replacement-character pass, recording a
//! [`BlockWarning::EncodingFallback`] when it does.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tabulon_error::TabulonError;
use tabulon_types::BlockWarning;

use crate::planner::PlannedBlock;

const CHUNK_SIZE: usize = 1024 * 1024;
const BLOCK_BYTE_CAP: usize = 1024 * 1024;

fn io_err(path: &Path, source: std::io::Error) -> TabulonError {
    TabulonError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Scan `path` line by line in 1 MiB chunks, invoking `f(line_no, raw_bytes)`
/// for each line (0-indexed, newline stripped). Returns the total line
/// count. A trailing, unterminated final line still counts.
pub fn for_each_line<F>(path: &Path, mut f: F) -> Result<u64, TabulonError>
where
    F: FnMut(u64, &[u8]) -> Result<(), TabulonError>,
{
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut carry: Vec<u8> = Vec::new();
    let mut line_no: u64 = 0;

    loop {
        let read = reader.read(&mut chunk).map_err(|e| io_err(path, e))?;
        if read == 0 {
            break;
        }
        let mut start = 0usize;
        for i in 0..read {
            if chunk[i] == b'\n' {
                if carry.is_empty() {
                    f(line_no, &chunk[start..i])?;
                } else {
                    carry.extend_from_slice(&chunk[start..i]);
                    f(line_no, &carry)?;
                    carry.clear();
                }
                line_no += 1;
                start = i + 1;
            }
        }
        if start < read {
            carry.extend_from_slice(&chunk[start..read]);
        }
    }

    if !carry.is_empty() {
        f(line_no, &carry)?;
        line_no += 1;
    }

    Ok(line_no)
}

/// Count the total number of lines in `path` without retaining any content.
pub fn count_lines(path: &Path) -> Result<u64, TabulonError> {
    for_each_line(path, |_, _| Ok(()))
}

/// A decoded line plus the raw byte length it occupied (used for encoding
/// and row-width tallies by the profiler).
#[derive(Debug, Clone)]
pub struct DecodedLine {
    pub line_no: u64,
    pub text: String,
    pub byte_len: usize,
}

/// The materialized content of one sampled block: decoded lines (possibly
/// truncated once [`BLOCK_BYTE_CAP`] is hit) plus any encoding warning.
#[derive(Debug, Clone, Default)]
pub struct RawBlock {
    pub lines: Vec<DecodedLine>,
    pub truncated: bool,
    pub warnings: Vec<BlockWarning>,
}

fn decode_line(bytes: &[u8]) -> (String, bool) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), false),
        Err(_) => {
            let (text, _, had_errors) = encoding_rs::WINDOWS_1251.decode(bytes);
            (text.into_owned(), had_errors)
        }
    }
}

/// Stream the line range `[block.start_line, block.end_line)` out of `path`,
/// decoding each line and capping resident content at `BLOCK_BYTE_CAP`.
pub fn read_block(path: &Path, block: &PlannedBlock) -> Result<RawBlock, TabulonError> {
    let mut out = RawBlock::default();
    let mut resident_bytes = 0usize;
    let mut saw_fallback = false;

    for_each_line(path, |line_no, raw| {
        if line_no < block.start_line || line_no >= block.end_line {
            return Ok(());
        }
        if resident_bytes >= BLOCK_BYTE_CAP {
            out.truncated = true;
            return Ok(());
        }
        let (text, used_fallback) = decode_line(raw);
        if used_fallback {
            saw_fallback = true;
        }
        resident_bytes += text.len();
        out.lines.push(DecodedLine {
            line_no,
            byte_len: raw.len(),
            text,
        });
        Ok(())
    })?;

    if saw_fallback {
        out.warnings.push(BlockWarning::EncodingFallback {
            encoding: "windows-1251".to_string(),
        });
    }

    Ok(out)
}

/// Compute each block's `(start_byte, end_byte)` span in one linear scan of
/// `path`, rather than rescanning the whole file once per block: the
/// production analysis path reads the same file through many blocks, and
/// `read_block`'s per-call `for_each_line` rescan from byte 0 would make
/// that `O(blocks * file_size)`.
pub fn locate_block_offsets(path: &Path, blocks: &[PlannedBlock]) -> Result<Vec<(u64, u64)>, TabulonError> {
    let mut boundaries: BTreeSet<u64> = BTreeSet::new();
    for block in blocks {
        boundaries.insert(block.start_line);
        boundaries.insert(block.end_line);
    }

    let mut offset_by_line: HashMap<u64, u64> = HashMap::new();
    if boundaries.contains(&0) {
        offset_by_line.insert(0, 0);
    }

    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut line_no: u64 = 0;
    let mut byte_pos: u64 = 0;

    loop {
        let read = reader.read(&mut chunk).map_err(|e| io_err(path, e))?;
        if read == 0 {
            break;
        }
        for i in 0..read {
            if chunk[i] == b'\n' {
                line_no += 1;
                if boundaries.contains(&line_no) {
                    offset_by_line.insert(line_no, byte_pos + i as u64 + 1);
                }
            }
        }
        byte_pos += read as u64;
    }

    // A boundary past the last newline (end-of-file with no trailing
    // newline, or `end_line == total_lines`) lands at the final byte
    // position reached.
    for &b in &boundaries {
        offset_by_line.entry(b).or_insert(byte_pos);
    }

    Ok(blocks
        .iter()
        .map(|block| {
            let start = offset_by_line.get(&block.start_line).copied().unwrap_or(0);
            let end = offset_by_line.get(&block.end_line).copied().unwrap_or(byte_pos);
            (start, end)
        })
        .collect())
}

/// Like [`read_block`], but seeks directly to a precomputed `(start_byte,
/// end_byte)` span from [`locate_block_offsets`] instead of scanning the
/// file from the beginning.
pub fn read_block_at(path: &Path, block: &PlannedBlock, byte_span: (u64, u64)) -> Result<RawBlock, TabulonError> {
    let (start_byte, end_byte) = byte_span;
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    std::io::Seek::seek(&mut reader, std::io::SeekFrom::Start(start_byte)).map_err(|e| io_err(path, e))?;
    let mut limited = reader.take(end_byte.saturating_sub(start_byte));

    let mut out = RawBlock::default();
    let mut resident_bytes = 0usize;
    let mut saw_fallback = false;
    let mut line_no = block.start_line;
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let read = limited.read(&mut chunk).map_err(|e| io_err(path, e))?;
        if read == 0 {
            break;
        }
        let mut start = 0usize;
        for i in 0..read {
            if chunk[i] == b'\n' {
                if line_no < block.end_line {
                    push_decoded_line(&mut out, &mut resident_bytes, &mut saw_fallback, line_no, &carry, &chunk[start..i]);
                }
                carry.clear();
                line_no += 1;
                start = i + 1;
            }
        }
        if start < read {
            carry.extend_from_slice(&chunk[start..read]);
        }
    }

    if !carry.is_empty() && line_no < block.end_line {
        push_decoded_line(&mut out, &mut resident_bytes, &mut saw_fallback, line_no, &[], &carry);
    }

    if saw_fallback {
        out.warnings.push(BlockWarning::EncodingFallback {
            encoding: "windows-1251".to_string(),
        });
    }

    Ok(out)
}

fn push_decoded_line(
    out: &mut RawBlock,
    resident_bytes: &mut usize,
    saw_fallback: &mut bool,
    line_no: u64,
    carry: &[u8],
    tail: &[u8],
) {
    if *resident_bytes >= BLOCK_BYTE_CAP {
        out.truncated = true;
        return;
    }
    let raw: Vec<u8> = if carry.is_empty() {
        tail.to_vec()
    } else {
        let mut v = carry.to_vec();
        v.extend_from_slice(tail);
        v
    };
    let (text, used_fallback) = decode_line(&raw);
    if used_fallback {
        *saw_fallback = true;
    }
    *resident_bytes += text.len();
    out.lines.push(DecodedLine {
        line_no,
        byte_len: raw.len(),
        text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        (dir, path)
    }

    #[test]
    fn counts_lines_with_trailing_newline() {
        let (_dir, path) = write_temp(b"a,b\n1,2\n3,4\n");
        assert_eq!(count_lines(&path).unwrap(), 3);
    }

    #[test]
    fn counts_final_unterminated_line() {
        let (_dir, path) = write_temp(b"a,b\n1,2");
        assert_eq!(count_lines(&path).unwrap(), 2);
    }

    #[test]
    fn empty_file_has_zero_lines() {
        let (_dir, path) = write_temp(b"");
        assert_eq!(count_lines(&path).unwrap(), 0);
    }

    #[test]
    fn reads_requested_line_range_only() {
        let (_dir, path) = write_temp(b"l0\nl1\nl2\nl3\nl4\n");
        let block = PlannedBlock {
            start_line: 1,
            end_line: 3,
        };
        let raw = read_block(&path, &block).unwrap();
        assert_eq!(raw.lines.len(), 2);
        assert_eq!(raw.lines[0].text, "l1");
        assert_eq!(raw.lines[1].text, "l2");
        assert!(!raw.truncated);
    }

    #[test]
    fn invalid_utf8_falls_back_to_windows_1251_with_warning() {
        // 0xC0 0xC1 are unassigned in UTF-8 continuation position but valid
        // single-byte Cyrillic letters under Windows-1251.
        let mut content = b"h0\n".to_vec();
        content.extend_from_slice(&[0xC0, 0xC1]);
        content.push(b'\n');
        let (_dir, path) = write_temp(&content);
        let block = PlannedBlock {
            start_line: 0,
            end_line: 2,
        };
        let raw = read_block(&path, &block).unwrap();
        assert_eq!(raw.lines.len(), 2);
        assert!(matches!(
            raw.warnings.as_slice(),
            [BlockWarning::EncodingFallback { .. }]
        ));
    }

    #[test]
    fn scans_chunk_boundary_spanning_lines_correctly() {
        // Force a line to straddle the 1 MiB chunk boundary.
        let padding = "x".repeat(CHUNK_SIZE - 5);
        let content = format!("{padding}\nSPLIT_LINE_MARKER\n");
        let (_dir, path) = write_temp(content.as_bytes());
        let total = count_lines(&path).unwrap();
        assert_eq!(total, 2);
        let block = PlannedBlock {
            start_line: 1,
            end_line: 2,
        };
        let raw = read_block(&path, &block).unwrap();
        assert_eq!(raw.lines[0].text, "SPLIT_LINE_MARKER");
    }

    #[test]
    fn locate_block_offsets_matches_read_block_line_for_line() {
        let (_dir, path) = write_temp(b"l0\nl1\nl2\nl3\nl4\n");
        let blocks = vec![
            PlannedBlock { start_line: 0, end_line: 2 },
            PlannedBlock { start_line: 2, end_line: 5 },
        ];
        let spans = locate_block_offsets(&path, &blocks).unwrap();
        assert_eq!(spans.len(), 2);

        for (block, span) in blocks.iter().zip(spans.iter()) {
            let via_scan = read_block(&path, block).unwrap();
            let via_seek = read_block_at(&path, block, *span).unwrap();
            let scan_texts: Vec<_> = via_scan.lines.iter().map(|l| l.text.clone()).collect();
            let seek_texts: Vec<_> = via_seek.lines.iter().map(|l| l.text.clone()).collect();
            assert_eq!(scan_texts, seek_texts);
        }
    }

    #[test]
    fn read_block_at_handles_a_trailing_unterminated_line() {
        let (_dir, path) = write_temp(b"a,b\n1,2\n3,4");
        let blocks = vec![PlannedBlock { start_line: 2, end_line: 3 }];
        let spans = locate_block_offsets(&path, &blocks).unwrap();
        let raw = read_block_at(&path, &blocks[0], spans[0]).unwrap();
        assert_eq!(raw.lines.len(), 1);
        assert_eq!(raw.lines[0].text, "3,4");
    }
}

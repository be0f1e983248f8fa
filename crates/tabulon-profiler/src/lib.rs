//! Signature & Column Profiler (spec.md §4.C): turns one sampled, decoded
//! block into a [`FileBlock`] — delimiter and header detection, per-column
//! type/uniqueness/top-k accumulation, and short/long row and mixed-
//! delimiter tallies.

pub mod accumulator;
pub mod delimiter;
pub mod header;

use accumulator::ColumnAccumulator;
use delimiter::detect_delimiter;
use header::looks_like_header;
use tabulon_config::Profile;
use tabulon_error::TabulonError;
use tabulon_sampling::RawBlock;
use tabulon_types::{BlockWarning, ColumnType, FileBlock, SchemaSignature};

const DELIMITER_SAMPLE_LINES: usize = 50;
const HEADER_BODY_SAMPLE_ROWS: usize = 20;

/// Profile one decoded block into its schema signature and column profiles.
pub fn profile_block(
    file_path: &str,
    block_start_line: u64,
    block_end_line: u64,
    byte_span: (u64, u64),
    raw: &RawBlock,
    profile: &Profile,
) -> Result<FileBlock, TabulonError> {
    let line_texts: Vec<String> = raw.lines.iter().map(|l| l.text.clone()).collect();
    let delimiter = detect_delimiter(&line_texts[..line_texts.len().min(DELIMITER_SAMPLE_LINES)]);

    let joined = line_texts.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(joined.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| TabulonError::Parsing {
            file: file_path.to_string(),
            line: block_start_line,
            reason: e.to_string(),
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Ok(empty_block(file_path, block_start_line, block_end_line, byte_span, delimiter, raw));
    }

    let body_sample: Vec<Vec<String>> = rows.iter().skip(1).take(HEADER_BODY_SAMPLE_ROWS).cloned().collect();
    let has_header = looks_like_header(&rows[0], &body_sample, profile.header_nontext_ratio);

    let header_sample = rows[0].clone();
    let data_rows: &[Vec<String>] = if has_header { &rows[1..] } else { &rows[..] };
    let column_count = mode_row_length(&rows);

    let mut accumulators: Vec<ColumnAccumulator> = (0..column_count)
        .map(|i| {
            let name = if has_header { header_sample.get(i).cloned() } else { None };
            ColumnAccumulator::new(name, profile.sample_values_cap.max(16), profile.sample_values_cap)
        })
        .collect();

    let mut short_rows = 0u64;
    let mut long_rows = 0u64;
    let mut ragged_rows_seen = false;

    for row in data_rows {
        match row.len().cmp(&column_count) {
            std::cmp::Ordering::Less => {
                short_rows += 1;
                ragged_rows_seen = true;
            }
            std::cmp::Ordering::Greater => {
                long_rows += 1;
                ragged_rows_seen = true;
            }
            std::cmp::Ordering::Equal => {}
        }
        for (i, acc) in accumulators.iter_mut().enumerate() {
            acc.observe(row.get(i).map(String::as_str).unwrap_or(""));
        }
    }

    let column_profiles: Vec<_> = accumulators.into_iter().map(ColumnAccumulator::finalize).collect();
    let column_types: Vec<ColumnType> = column_profiles.iter().map(|p| p.type_hist.dominant()).collect();

    let mut warnings = raw.warnings.clone();
    if ragged_rows_seen {
        warnings.push(BlockWarning::MixedDelimiter {
            dominant: delimiter.to_string(),
        });
    }

    Ok(FileBlock {
        file_path: file_path.to_string(),
        start_line: block_start_line,
        end_line: block_end_line,
        byte_span,
        signature: SchemaSignature {
            delimiter,
            header_sample,
            column_count,
            column_types,
        },
        column_profiles,
        warnings,
        short_rows,
        long_rows,
    })
}

/// The most common row length in the block; ties favor the shorter length.
fn mode_row_length(rows: &[Vec<String>]) -> usize {
    let mut counts: std::collections::HashMap<usize, u64> = std::collections::HashMap::new();
    for row in rows {
        *counts.entry(row.len()).or_insert(0) += 1;
    }
    let mut entries: Vec<(usize, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries.first().map(|(len, _)| *len).unwrap_or(0)
}

fn empty_block(
    file_path: &str,
    start_line: u64,
    end_line: u64,
    byte_span: (u64, u64),
    delimiter: tabulon_types::Delimiter,
    raw: &RawBlock,
) -> FileBlock {
    FileBlock {
        file_path: file_path.to_string(),
        start_line,
        end_line,
        byte_span,
        signature: SchemaSignature {
            delimiter,
            header_sample: Vec::new(),
            column_count: 0,
            column_types: Vec::new(),
        },
        column_profiles: Vec::new(),
        warnings: raw.warnings.clone(),
        short_rows: 0,
        long_rows: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabulon_sampling::DecodedLine;

    fn raw_from(lines: &[&str]) -> RawBlock {
        RawBlock {
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, l)| DecodedLine {
                    line_no: i as u64,
                    text: l.to_string(),
                    byte_len: l.len(),
                })
                .collect(),
            truncated: false,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn profiles_a_simple_header_block() {
        let raw = raw_from(&["name,age,city", "Alice,30,NYC", "Bob,41,LA"]);
        let profile = Profile::low_memory();
        let block = profile_block("f.csv", 0, 3, (0, 30), &raw, &profile).unwrap();
        assert_eq!(block.signature.column_count, 3);
        assert_eq!(block.signature.header_sample, vec!["name", "age", "city"]);
        assert_eq!(block.column_profiles[1].type_hist.numeric, 2);
    }

    #[test]
    fn headerless_block_has_no_header_sample_names() {
        let raw = raw_from(&["1,2,3", "4,5,6"]);
        let profile = Profile::low_memory();
        let block = profile_block("f.csv", 0, 2, (0, 10), &raw, &profile).unwrap();
        assert!(block.column_profiles.iter().all(|p| p.name.is_none()));
    }

    #[test]
    fn short_and_long_rows_are_tallied() {
        let raw = raw_from(&["a,b,c", "1,2,3", "1,2", "1,2,3,4"]);
        let profile = Profile::low_memory();
        let block = profile_block("f.csv", 0, 4, (0, 20), &raw, &profile).unwrap();
        assert_eq!(block.short_rows, 1);
        assert_eq!(block.long_rows, 1);
    }

    #[test]
    fn empty_block_has_zero_columns() {
        let raw = raw_from(&[]);
        let profile = Profile::low_memory();
        let block = profile_block("f.csv", 0, 0, (0, 0), &raw, &profile).unwrap();
        assert_eq!(block.signature.column_count, 0);
    }
}

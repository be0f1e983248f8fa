//! Column offset detection and row normalization (spec.md §4.F): map a
//! file's raw column order onto a `SchemaDefinition`'s canonical column
//! order, preferring the header-cluster membership and falling back to
//! positional alignment when a column has no cluster match in this file.

use std::collections::HashMap;

use tabulon_types::{ColumnProfile, ColumnType, DiscoveredColumn, HeaderClusterDocument};

/// Maps each target (canonical-ordered) column index to the source row
/// index it should be read from, or `None` if this file has no match for
/// that target column, along with a per-target confidence in `[0.0, 1.0]`.
#[derive(Debug, Clone, Default)]
pub struct OffsetMap {
    pub target_to_source: Vec<Option<usize>>,
    pub confidences: Vec<f64>,
}

/// Build the offset map for one file against a schema's discovered columns:
/// cluster membership first, then a profile-distance fallback (type
/// histogram, null ratio, numeric range overlap) for any target column this
/// file's header didn't match via clustering, and finally plain positional
/// alignment for anything profile data can't disambiguate.
///
/// `target_profiles` gives one representative [`ColumnProfile`] per
/// `schema_columns` entry (e.g. from the schema's reference block), and
/// `source_profiles` gives this file's own per-column profiles, both indexed
/// by column position.
#[must_use]
pub fn detect_offsets(
    file_path: &str,
    source_column_count: usize,
    schema_columns: &[DiscoveredColumn],
    clusters: &HeaderClusterDocument,
    target_profiles: &[Option<ColumnProfile>],
    source_profiles: &[ColumnProfile],
) -> OffsetMap {
    let mut target_to_source: Vec<Option<usize>> = vec![None; schema_columns.len()];
    let mut confidences: Vec<f64> = vec![0.0; schema_columns.len()];
    let mut used_source: Vec<bool> = vec![false; source_column_count];

    // Pass 1: cluster membership match, keyed by the cluster whose canonical
    // name equals this target column's discovered name.
    let name_to_cluster: HashMap<&str, &tabulon_types::HeaderCluster> = clusters
        .clusters
        .iter()
        .map(|c| (c.canonical_name.as_str(), c))
        .collect();

    for (target_idx, column) in schema_columns.iter().enumerate() {
        let Some(name) = column.name.as_deref() else {
            continue;
        };
        let Some(cluster) = name_to_cluster.get(name) else {
            continue;
        };
        if let Some(member) = cluster.members.iter().find(|m| m.file_path == file_path) {
            if member.column_index < source_column_count {
                target_to_source[target_idx] = Some(member.column_index);
                confidences[target_idx] = 1.0;
                used_source[member.column_index] = true;
            }
        }
    }

    // Pass 2: profile-distance fallback. Greedily pair the closest remaining
    // (target, source) column by type histogram, null ratio, and numeric
    // range overlap, repeating until no profiled pair remains.
    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for (target_idx, slot) in target_to_source.iter().enumerate() {
            if slot.is_some() {
                continue;
            }
            let Some(Some(target_profile)) = target_profiles.get(target_idx) else {
                continue;
            };
            for (source_idx, used) in used_source.iter().enumerate() {
                if *used {
                    continue;
                }
                let Some(source_profile) = source_profiles.get(source_idx) else {
                    continue;
                };
                let distance = column_distance(target_profile, source_profile);
                let improves = match best {
                    Some((_, _, best_distance)) => distance < best_distance,
                    None => true,
                };
                if improves {
                    best = Some((target_idx, source_idx, distance));
                }
            }
        }
        let Some((target_idx, source_idx, distance)) = best else {
            break;
        };
        target_to_source[target_idx] = Some(source_idx);
        confidences[target_idx] = (1.0 - distance).clamp(0.0, 1.0);
        used_source[source_idx] = true;
    }

    // Pass 3: positional fallback for anything still unmatched, taking the
    // next unused source column in order. Confidence is a flat midpoint
    // since there's no profile evidence to back the guess.
    let unmatched: Vec<usize> = target_to_source
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_none())
        .map(|(i, _)| i)
        .collect();
    let mut next_unused = 0usize;
    for target_idx in unmatched {
        while next_unused < used_source.len() && used_source[next_unused] {
            next_unused += 1;
        }
        if next_unused < source_column_count {
            target_to_source[target_idx] = Some(next_unused);
            confidences[target_idx] = 0.5;
            used_source[next_unused] = true;
            next_unused += 1;
        }
    }

    OffsetMap { target_to_source, confidences }
}

/// Distance in `[0.0, 1.0]` between two columns' profiles: lower means more
/// alike. Weighted blend of dominant-type agreement, null-ratio closeness,
/// and (for numeric columns) observed value range overlap.
fn column_distance(a: &ColumnProfile, b: &ColumnProfile) -> f64 {
    let type_term = if a.type_hist.dominant() == b.type_hist.dominant() { 0.0 } else { 1.0 };
    let null_term = (a.null_ratio() - b.null_ratio()).abs();
    let range_term = numeric_range_distance(a, b);
    0.5 * type_term + 0.25 * null_term + 0.25 * range_term
}

fn numeric_range_distance(a: &ColumnProfile, b: &ColumnProfile) -> f64 {
    if a.type_hist.dominant() != ColumnType::Numeric || b.type_hist.dominant() != ColumnType::Numeric {
        return 0.0;
    }
    let parsed = |p: &ColumnProfile| -> Option<(f64, f64)> {
        let min = p.min.as_deref()?.parse::<f64>().ok()?;
        let max = p.max.as_deref()?.parse::<f64>().ok()?;
        Some((min, max))
    };
    let (Some((a_min, a_max)), Some((b_min, b_max))) = (parsed(a), parsed(b)) else {
        return 0.5;
    };

    let overlap_lo = a_min.max(b_min);
    let overlap_hi = a_max.min(b_max);
    if overlap_hi < overlap_lo {
        return 1.0;
    }
    let union_lo = a_min.min(b_min);
    let union_hi = a_max.max(b_max);
    let union_span = (union_hi - union_lo).max(f64::EPSILON);
    1.0 - (overlap_hi - overlap_lo) / union_span
}

/// Reorder one raw row into canonical column order. Target columns with no
/// source mapping are null-filled; source columns never claimed by any
/// target are dropped and counted.
#[must_use]
pub fn reorder_row(row: &[String], offsets: &OffsetMap) -> (Vec<Option<String>>, usize) {
    let out: Vec<Option<String>> = offsets
        .target_to_source
        .iter()
        .map(|src| src.and_then(|i| row.get(i).cloned()))
        .collect();

    let claimed: std::collections::HashSet<usize> = offsets.target_to_source.iter().filter_map(|s| *s).collect();
    let dropped_extra = row.len().saturating_sub(claimed.len());

    (out, dropped_extra)
}

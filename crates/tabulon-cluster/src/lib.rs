//! Header Similarity Clusterer (spec.md §4.E): groups (file, column) header
//! occurrences into [`HeaderCluster`]s by union-find over edges that clear
//! the similarity threshold, never materializing the full pairwise matrix.

pub mod normalize;
pub mod scoring;
pub mod unionfind;

use std::collections::{BTreeMap, BTreeSet};

use tabulon_types::{ClusterMember, ColumnType, HeaderCluster, HeaderClusterDocument, ReasonCode};

use normalize::normalize_header;
use scoring::{similarity, types_compatible};
use unionfind::UnionFind;

/// Edge weight threshold above which two headers are unioned into one cluster.
pub const EDGE_THRESHOLD: f64 = 0.55;
/// Mean intra-cluster similarity below which a cluster is flagged for review.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.75;
/// Fraction of member columns whose dominant type may differ from the
/// cluster's own majority type before it's flagged for review.
pub const TYPE_DISAGREEMENT_THRESHOLD: f64 = 0.15;

/// One observed header occurrence feeding into clustering.
#[derive(Debug, Clone)]
pub struct HeaderCandidate {
    pub file_path: String,
    pub column_index: usize,
    pub raw_name: String,
    pub dominant_type: ColumnType,
}

/// Cluster `candidates` into a new [`HeaderClusterDocument`] at
/// `artifact_version`. `previous`, when given, is diffed against so a
/// cluster's `version` only advances when its membership or canonical name
/// actually changed, rather than on every re-cluster.
#[must_use]
pub fn build_clusters(
    candidates: &[HeaderCandidate],
    artifact_version: u32,
    previous: Option<&HeaderClusterDocument>,
) -> HeaderClusterDocument {
    let n = candidates.len();
    let normalized: Vec<String> = candidates.iter().map(|c| normalize_header(&c.raw_name)).collect();

    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if !types_compatible(candidates[i].dominant_type, candidates[j].dominant_type) {
                continue;
            }
            let weight = similarity(&normalized[i], &normalized[j]);
            if weight >= EDGE_THRESHOLD {
                uf.union(i, j);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }

    let mut clusters: Vec<HeaderCluster> = groups
        .into_values()
        .enumerate()
        .map(|(ordinal, member_indices)| build_one_cluster(ordinal, &member_indices, candidates, &normalized, previous))
        .collect();

    clusters.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));

    HeaderClusterDocument {
        artifact_version,
        clusters,
    }
}

/// The member set of a cluster, keyed by `(file_path, column_index)`, used to
/// recognize "the same cluster" across two clustering runs regardless of
/// reassigned ordinals.
fn member_key(members: &[ClusterMember]) -> BTreeSet<(String, usize)> {
    members.iter().map(|m| (m.file_path.clone(), m.column_index)).collect()
}

fn find_previous<'a>(previous: Option<&'a HeaderClusterDocument>, members: &[ClusterMember]) -> Option<&'a HeaderCluster> {
    let previous = previous?;
    let key = member_key(members);
    previous.clusters.iter().find(|c| member_key(&c.members) == key)
}

fn build_one_cluster(
    ordinal: usize,
    member_indices: &[usize],
    candidates: &[HeaderCandidate],
    normalized: &[String],
    previous: Option<&HeaderClusterDocument>,
) -> HeaderCluster {
    let members: Vec<ClusterMember> = member_indices
        .iter()
        .map(|&i| ClusterMember {
            file_path: candidates[i].file_path.clone(),
            column_index: candidates[i].column_index,
            raw_name: candidates[i].raw_name.clone(),
        })
        .collect();

    let confidence = mean_pairwise_similarity(member_indices, normalized);

    let canonical_name = pick_canonical_name(member_indices, candidates, normalized);

    let mut reason_codes = Vec::new();
    if confidence < LOW_CONFIDENCE_THRESHOLD {
        reason_codes.push(ReasonCode::LowConfidence);
    }
    if has_type_disagreement(member_indices, candidates) {
        reason_codes.push(ReasonCode::TypeProfileDisagreement);
    }

    let version = match find_previous(previous, &members) {
        Some(prev) if prev.canonical_name == canonical_name => prev.version,
        Some(prev) => prev.version + 1,
        None => 1,
    };

    HeaderCluster {
        cluster_id: format!("cluster-{ordinal:04}"),
        canonical_name,
        members,
        confidence,
        needs_review: !reason_codes.is_empty(),
        version,
        reason_codes,
    }
}

fn mean_pairwise_similarity(member_indices: &[usize], normalized: &[String]) -> f64 {
    if member_indices.len() <= 1 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for i in 0..member_indices.len() {
        for j in (i + 1)..member_indices.len() {
            total += similarity(&normalized[member_indices[i]], &normalized[member_indices[j]]);
            count += 1;
        }
    }
    if count == 0 {
        1.0
    } else {
        total / count as f64
    }
}

fn pick_canonical_name(member_indices: &[usize], candidates: &[HeaderCandidate], normalized: &[String]) -> String {
    if member_indices.len() == 1 {
        return candidates[member_indices[0]].raw_name.clone();
    }

    let mut best_idx = member_indices[0];
    let mut best_centrality = f64::MIN;

    for &i in member_indices {
        let centrality: f64 = member_indices
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| similarity(&normalized[i], &normalized[j]))
            .sum();

        let name_i = &candidates[i].raw_name;
        let name_best = &candidates[best_idx].raw_name;
        let better = centrality > best_centrality
            || ((centrality - best_centrality).abs() < 1e-9 && name_i < name_best);
        if better {
            best_centrality = centrality;
            best_idx = i;
        }
    }

    candidates[best_idx].raw_name.clone()
}

fn has_type_disagreement(member_indices: &[usize], candidates: &[HeaderCandidate]) -> bool {
    type_disagreement_ratio(member_indices, candidates) >= TYPE_DISAGREEMENT_THRESHOLD
}

/// Fraction of member columns whose dominant type differs from the
/// cluster's own majority dominant type.
fn type_disagreement_ratio(member_indices: &[usize], candidates: &[HeaderCandidate]) -> f64 {
    if member_indices.is_empty() {
        return 0.0;
    }
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for &i in member_indices {
        let key = match candidates[i].dominant_type {
            ColumnType::Numeric => "numeric",
            ColumnType::Date => "date",
            ColumnType::Bool => "bool",
            ColumnType::Text => "text",
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    let majority_count = counts.values().copied().max().unwrap_or(0);
    1.0 - (majority_count as f64 / member_indices.len() as f64)
}

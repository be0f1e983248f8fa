use serde::{Deserialize, Serialize};

/// A (file, column) pair that contributed a raw header to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub file_path: String,
    pub column_index: usize,
    pub raw_name: String,
}

/// Why a cluster is flagged for human review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    LowConfidence,
    TypeProfileDisagreement,
}

/// A set of (file, column) pairs judged to denote the same logical field.
///
/// `version` is bumped only when membership or `canonical_name` changes,
/// never on every re-cluster, so unrelated clusters in the same artifact
/// don't churn their version on unrelated changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderCluster {
    pub cluster_id: String,
    pub canonical_name: String,
    pub members: Vec<ClusterMember>,
    pub confidence: f64,
    pub needs_review: bool,
    pub version: u32,
    pub reason_codes: Vec<ReasonCode>,
}

/// The header-cluster artifact: all clusters for one analysis run, carrying
/// a monotonic `artifact_version` bumped on every persisted revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderClusterDocument {
    pub artifact_version: u32,
    pub clusters: Vec<HeaderCluster>,
}

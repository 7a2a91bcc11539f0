//! Clustering strategies over corpus types.
//!
//! Three structurally different algorithms sit behind one closed variant,
//! [`ClusterStrategy`], and all return a [`ClusterResult`] that knows how to
//! render both module outputs:
//!
//! | strategy | text output | structured output |
//! |----------|-------------|-------------------|
//! | `KM` flat k-medoids | DOT, one subgraph per cluster | array of cluster records |
//! | `HAC` hierarchical | DOT of the merge tree | `null` |
//! | `NJ` neighbor joining | Newick tree | `null` |

pub mod distance;
pub mod flat;
pub mod hierarchical;
pub mod neighbor_join;
pub mod render;

pub use flat::{ClusterRecord, FlatCluster, FlatClusterer, TypeRef};
pub use hierarchical::{HierarchicalCluster, HierarchicalClusterer};
pub use neighbor_join::NeighborJoining;

use crate::corpus::Type;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of flat clusters requested by the `KM` strategy.
pub const DEFAULT_CLUSTER_COUNT: usize = 3;

/// Iteration budget of the `KM` strategy.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Configuration-level choice of algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusteringType {
    /// `NJ`
    NeighborJoining,
    /// `KM`
    #[default]
    KMedoids,
    /// `HAC`
    Hierarchical,
}

impl ClusteringType {
    pub fn code(&self) -> &'static str {
        match self {
            ClusteringType::NeighborJoining => "NJ",
            ClusteringType::KMedoids => "KM",
            ClusteringType::Hierarchical => "HAC",
        }
    }

    /// Parse a property value. Missing or unrecognized values fall back to
    /// `KM`; the flag reports whether the value was recognized.
    pub fn from_property(value: Option<&str>) -> (Self, bool) {
        match value.map(str::parse::<ClusteringType>) {
            Some(Ok(t)) => (t, true),
            Some(Err(_)) => (ClusteringType::default(), false),
            None => (ClusteringType::default(), true),
        }
    }
}

impl fmt::Display for ClusteringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown clustering type '{0}' (expected NJ, KM or HAC)")]
pub struct UnknownClusteringType(pub String);

impl FromStr for ClusteringType {
    type Err = UnknownClusteringType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NJ" => Ok(ClusteringType::NeighborJoining),
            "KM" => Ok(ClusteringType::KMedoids),
            "HAC" => Ok(ClusteringType::Hierarchical),
            other => Err(UnknownClusteringType(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{algorithm} post-condition violated: {message}")]
    ContractViolation {
        algorithm: &'static str,
        message: String,
    },
}

/// A runnable clustering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStrategy {
    FlatCluster { k: usize, iterations: usize },
    Hierarchical,
    NeighborJoined,
}

impl ClusterStrategy {
    pub fn for_type(clustering_type: ClusteringType) -> Self {
        match clustering_type {
            ClusteringType::KMedoids => ClusterStrategy::FlatCluster {
                k: DEFAULT_CLUSTER_COUNT,
                iterations: DEFAULT_ITERATIONS,
            },
            ClusteringType::Hierarchical => ClusterStrategy::Hierarchical,
            ClusteringType::NeighborJoining => ClusterStrategy::NeighborJoined,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClusterStrategy::FlatCluster { .. } => "flat k-medoids clustering",
            ClusterStrategy::Hierarchical => "hierarchical agglomerative clustering",
            ClusterStrategy::NeighborJoined => "neighbor joining",
        }
    }

    /// Cluster `types`, labelling graph exports with `graph_name`.
    pub fn cluster(&self, types: &[Type], graph_name: &str) -> Result<ClusterResult, ClusterError> {
        match *self {
            ClusterStrategy::FlatCluster { k, iterations } => {
                let mut clusterer = FlatClusterer::new(types);
                let clusters = clusterer.analyse(k, iterations);
                for cluster in &clusters {
                    tracing::debug!(
                        "Flat cluster medoid '{}' with {} member(s)",
                        cluster.medoid.label,
                        cluster.members.len()
                    );
                }
                Ok(ClusterResult::Flat {
                    dot: clusterer.to_dot(graph_name),
                    clusters,
                })
            }
            ClusterStrategy::Hierarchical => {
                tracing::info!("Hierarchical clustering of {} types", types.len());
                let mut clusterer = HierarchicalClusterer::new(types);
                clusterer.analyze();
                if clusterer.clusters().len() != 1 {
                    return Err(ClusterError::ContractViolation {
                        algorithm: self.name(),
                        message: format!(
                            "expected exactly 1 root cluster, got {} (from {} types)",
                            clusterer.clusters().len(),
                            types.len()
                        ),
                    });
                }
                let dot = clusterer.to_dot(graph_name);
                let root = clusterer.into_clusters().remove(0);
                Ok(ClusterResult::Hierarchical { root, dot })
            }
            ClusterStrategy::NeighborJoined => {
                tracing::info!("Neighbor joining of {} types", types.len());
                let mut nj = NeighborJoining::new(types);
                nj.start();
                Ok(ClusterResult::NeighborJoined {
                    tree: nj.tree().to_string(),
                })
            }
        }
    }
}

/// Output of any strategy, carrying what both module outputs need.
#[derive(Debug, Clone)]
pub enum ClusterResult {
    Flat {
        clusters: Vec<FlatCluster>,
        dot: String,
    },
    Hierarchical {
        root: HierarchicalCluster,
        dot: String,
    },
    NeighborJoined {
        tree: String,
    },
}

impl ClusterResult {
    /// Text output: DOT document or Newick tree.
    pub fn text(&self) -> &str {
        match self {
            ClusterResult::Flat { dot, .. } | ClusterResult::Hierarchical { dot, .. } => dot,
            ClusterResult::NeighborJoined { tree } => tree,
        }
    }

    /// Structured output: cluster records for flat results, `null` otherwise.
    ///
    /// `null` means the text output is the only authoritative result.
    pub fn json(&self) -> serde_json::Value {
        match self {
            ClusterResult::Flat { clusters, .. } => serde_json::Value::Array(
                clusters
                    .iter()
                    .map(|c| {
                        let record = c.record();
                        serde_json::json!({
                            "medoid": { "id": record.medoid.id, "label": record.medoid.label },
                            "members": record
                                .members
                                .iter()
                                .map(|m| serde_json::json!({ "id": m.id, "label": m.label }))
                                .collect::<Vec<_>>(),
                        })
                    })
                    .collect(),
            ),
            ClusterResult::Hierarchical { .. } | ClusterResult::NeighborJoined { .. } => {
                serde_json::Value::Null
            }
        }
    }

    pub fn cluster_count(&self) -> usize {
        match self {
            ClusterResult::Flat { clusters, .. } => clusters.len(),
            ClusterResult::Hierarchical { .. } => 1,
            ClusterResult::NeighborJoined { .. } => 0,
        }
    }
}

//! Flat clustering around medoids.
//!
//! Deterministic k-medoids: seeds are chosen farthest-first starting from the
//! first type, then assignment and medoid update alternate until the medoids
//! stop moving or the iteration budget is spent.

use crate::clustering::distance::DistanceMatrix;
use crate::clustering::render::dot_quote;
use crate::corpus::Type;
use serde::Serialize;
use std::fmt::Write;

/// One flat cluster. The medoid is always a member.
#[derive(Debug, Clone)]
pub struct FlatCluster {
    pub medoid: Type,
    pub members: Vec<Type>,
}

/// Reference to a type inside a serialized cluster record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeRef {
    pub id: u32,
    pub label: String,
}

impl From<&Type> for TypeRef {
    fn from(t: &Type) -> Self {
        Self {
            id: t.id,
            label: t.label.clone(),
        }
    }
}

/// JSON-serializable form of a [`FlatCluster`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecord {
    pub medoid: TypeRef,
    pub members: Vec<TypeRef>,
}

impl FlatCluster {
    pub fn record(&self) -> ClusterRecord {
        ClusterRecord {
            medoid: TypeRef::from(&self.medoid),
            members: self.members.iter().map(TypeRef::from).collect(),
        }
    }
}

pub struct FlatClusterer<'a> {
    types: &'a [Type],
    distances: DistanceMatrix,
    /// Per cluster: medoid index and member indices into `types`.
    assignment: Vec<(usize, Vec<usize>)>,
}

impl<'a> FlatClusterer<'a> {
    pub fn new(types: &'a [Type]) -> Self {
        Self {
            types,
            distances: DistanceMatrix::new(types),
            assignment: Vec::new(),
        }
    }

    /// Partition the types into `k` clusters (fewer if there are fewer than
    /// `k` types).
    pub fn analyse(&mut self, k: usize, iterations: usize) -> Vec<FlatCluster> {
        let k = k.min(self.types.len());
        if k == 0 {
            self.assignment.clear();
            return Vec::new();
        }

        let mut medoids = self.seed(k);
        let mut members = self.assign(&medoids);
        for round in 0..iterations {
            let updated: Vec<usize> = members
                .iter()
                .zip(&medoids)
                .map(|(m, &current)| self.best_medoid(m, current))
                .collect();
            if updated == medoids {
                tracing::trace!("k-medoids converged after {} rounds", round);
                break;
            }
            medoids = updated;
            members = self.assign(&medoids);
        }

        self.assignment = medoids.into_iter().zip(members).collect();
        self.clusters()
    }

    /// Clusters from the last `analyse` call.
    pub fn clusters(&self) -> Vec<FlatCluster> {
        self.assignment
            .iter()
            .map(|(medoid, members)| FlatCluster {
                medoid: self.types[*medoid].clone(),
                members: members.iter().map(|&i| self.types[i].clone()).collect(),
            })
            .collect()
    }

    /// DOT graph with one `cluster_<i>` subgraph per cluster.
    pub fn to_dot(&self, graph_name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {} {{", dot_quote(graph_name));
        let _ = writeln!(out, "  node [shape=box];");
        for (i, (medoid, members)) in self.assignment.iter().enumerate() {
            let medoid_id = format!("t{}", self.types[*medoid].id);
            let _ = writeln!(out, "  subgraph cluster_{} {{", i);
            let _ = writeln!(
                out,
                "    label = {};",
                dot_quote(&format!("medoid: {}", self.types[*medoid].label))
            );
            for &m in members {
                let t = &self.types[m];
                let style = if m == *medoid { ", style=bold" } else { "" };
                let _ = writeln!(out, "    t{} [label={}{}];", t.id, dot_quote(&t.label), style);
            }
            for &m in members {
                if m != *medoid {
                    let _ = writeln!(out, "    {} -> t{};", medoid_id, self.types[m].id);
                }
            }
            let _ = writeln!(out, "  }}");
        }
        out.push_str("}\n");
        out
    }

    /// Farthest-first seeding from index 0.
    fn seed(&self, k: usize) -> Vec<usize> {
        let n = self.types.len();
        let mut medoids = vec![0];
        while medoids.len() < k {
            let next = (0..n)
                .filter(|i| !medoids.contains(i))
                .map(|i| {
                    let nearest = medoids
                        .iter()
                        .map(|&m| self.distances.get(i, m))
                        .fold(f64::INFINITY, f64::min);
                    (i, nearest)
                })
                .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                    Some((_, bd)) if bd >= d => best,
                    _ => Some((i, d)),
                });
            match next {
                Some((i, _)) => medoids.push(i),
                None => break,
            }
        }
        medoids
    }

    /// Nearest-medoid assignment. Medoids always stay in their own cluster,
    /// so no cluster is ever empty.
    fn assign(&self, medoids: &[usize]) -> Vec<Vec<usize>> {
        let mut members: Vec<Vec<usize>> = medoids.iter().map(|&m| vec![m]).collect();
        for i in 0..self.types.len() {
            if medoids.contains(&i) {
                continue;
            }
            let mut best = 0;
            for (c, &m) in medoids.iter().enumerate() {
                if self.distances.get(i, m) < self.distances.get(i, medoids[best]) {
                    best = c;
                }
            }
            members[best].push(i);
        }
        for m in &mut members {
            m.sort_unstable();
        }
        members
    }

    /// Member with the smallest total distance to the rest; keeps the current
    /// medoid on ties.
    fn best_medoid(&self, members: &[usize], current: usize) -> usize {
        let cost = |c: usize| members.iter().map(|&j| self.distances.get(c, j)).sum::<f64>();
        let mut best = current;
        let mut best_cost = cost(current);
        for &candidate in members {
            let c = cost(candidate);
            if c < best_cost {
                best = candidate;
                best_cost = c;
            }
        }
        best
    }
}

//! Hierarchical agglomerative clustering (average linkage).
//!
//! Starts with one cluster per type and repeatedly merges the closest pair
//! until a single root remains. The post-condition of `analyze` is exactly
//! one cluster; callers must check it (see `ClusterStrategy`).

use crate::clustering::distance::DistanceMatrix;
use crate::clustering::render::dot_quote;
use crate::corpus::Type;
use std::fmt::Write;

/// A node of the merge tree. Leaves hold exactly one type.
#[derive(Debug, Clone)]
pub struct HierarchicalCluster {
    pub id: usize,
    pub types: Vec<Type>,
    /// Linkage distance at which the children were merged (0 for leaves).
    pub distance: f64,
    pub children: Option<(Box<HierarchicalCluster>, Box<HierarchicalCluster>)>,
}

impl HierarchicalCluster {
    fn leaf(id: usize, t: Type) -> Self {
        Self {
            id,
            types: vec![t],
            distance: 0.0,
            children: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn size(&self) -> usize {
        self.types.len()
    }

    /// Number of nodes in the subtree, this one included.
    pub fn node_count(&self) -> usize {
        match &self.children {
            None => 1,
            Some((l, r)) => 1 + l.node_count() + r.node_count(),
        }
    }
}

pub struct HierarchicalClusterer<'a> {
    types: &'a [Type],
    clusters: Vec<HierarchicalCluster>,
}

impl<'a> HierarchicalClusterer<'a> {
    pub fn new(types: &'a [Type]) -> Self {
        Self {
            types,
            clusters: Vec::new(),
        }
    }

    /// Run the agglomeration. Afterwards `clusters()` holds the roots that
    /// are left, which is one for any non-empty input.
    pub fn analyze(&mut self) {
        let matrix = DistanceMatrix::new(self.types);
        let mut dist = matrix.to_rows();
        let mut active: Vec<Option<HierarchicalCluster>> = self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| Some(HierarchicalCluster::leaf(i, t.clone())))
            .collect();
        let mut next_id = active.len();
        let mut remaining = active.len();

        while remaining > 1 {
            let Some((a, b, d)) = closest_pair(&active, &dist) else {
                break;
            };
            let (Some(left), Some(right)) = (active[a].take(), active[b].take()) else {
                break;
            };

            // Lance-Williams update for average linkage.
            let (na, nb) = (left.size() as f64, right.size() as f64);
            let mut row = vec![0.0; dist.len() + 1];
            for k in 0..dist.len() {
                if active[k].is_some() {
                    row[k] = (na * dist[a][k] + nb * dist[b][k]) / (na + nb);
                }
            }
            for (k, r) in dist.iter_mut().enumerate() {
                r.push(row[k]);
            }
            dist.push(row);

            let mut types = left.types.clone();
            types.extend(right.types.iter().cloned());
            types.sort();
            active.push(Some(HierarchicalCluster {
                id: next_id,
                types,
                distance: d,
                children: Some((Box::new(left), Box::new(right))),
            }));
            next_id += 1;
            remaining -= 1;
        }

        self.clusters = active.into_iter().flatten().collect();
        tracing::debug!(
            "Hierarchical clustering of {} types left {} root(s)",
            self.types.len(),
            self.clusters.len()
        );
    }

    pub fn clusters(&self) -> &[HierarchicalCluster] {
        &self.clusters
    }

    pub fn into_clusters(self) -> Vec<HierarchicalCluster> {
        self.clusters
    }

    /// DOT graph of the merge tree(s): edges point from parent to child.
    pub fn to_dot(&self, graph_name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {} {{", dot_quote(graph_name));
        for root in &self.clusters {
            write_dot_node(&mut out, root);
        }
        out.push_str("}\n");
        out
    }
}

fn closest_pair(
    active: &[Option<HierarchicalCluster>],
    dist: &[Vec<f64>],
) -> Option<(usize, usize, f64)> {
    let live: Vec<usize> = (0..active.len()).filter(|&i| active[i].is_some()).collect();
    let mut best: Option<(usize, usize, f64)> = None;
    for (x, &i) in live.iter().enumerate() {
        for &j in &live[x + 1..] {
            let d = dist[i][j];
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((i, j, d));
            }
        }
    }
    best
}

fn write_dot_node(out: &mut String, cluster: &HierarchicalCluster) {
    match &cluster.children {
        None => {
            let label = cluster.types.first().map(|t| t.label.as_str()).unwrap_or("");
            let _ = writeln!(out, "  c{} [shape=box, label={}];", cluster.id, dot_quote(label));
        }
        Some((left, right)) => {
            let _ = writeln!(
                out,
                "  c{} [shape=point, label={}];",
                cluster.id,
                dot_quote(&format!("{:.4}", cluster.distance))
            );
            let _ = writeln!(out, "  c{} -> c{};", cluster.id, left.id);
            let _ = writeln!(out, "  c{} -> c{};", cluster.id, right.id);
            write_dot_node(out, left);
            write_dot_node(out, right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> Vec<Type> {
        vec![
            Type::new(0, "a").with_frequency(2, 1.0),
            Type::new(1, "b").with_frequency(2, 1.0).with_frequency(3, 0.1),
            Type::new(2, "c").with_frequency(3, 1.0),
            Type::new(3, "d").with_frequency(4, 1.0),
        ]
    }

    #[test]
    fn test_single_root_for_non_empty_input() {
        let types = types();
        let mut hac = HierarchicalClusterer::new(&types);
        hac.analyze();
        assert_eq!(hac.clusters().len(), 1);
        let root = &hac.clusters()[0];
        assert_eq!(root.size(), 4);
        // n leaves, n - 1 merges
        assert_eq!(root.node_count(), 7);
    }

    #[test]
    fn test_closest_types_merge_first() {
        let types = types();
        let mut hac = HierarchicalClusterer::new(&types);
        hac.analyze();
        let mut node = &hac.clusters()[0];
        // Descend to the deepest merge containing "a".
        while let Some((l, r)) = &node.children {
            node = if l.types.iter().any(|t| t.id == 0) { &**l } else { &**r };
            if node.size() == 2 {
                break;
            }
        }
        let ids: Vec<u32> = node.types.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_single_type_is_its_own_root() {
        let types = vec![Type::new(7, "solo")];
        let mut hac = HierarchicalClusterer::new(&types);
        hac.analyze();
        assert_eq!(hac.clusters().len(), 1);
        assert!(hac.clusters()[0].is_leaf());
    }

    #[test]
    fn test_empty_input_has_no_root() {
        let mut hac = HierarchicalClusterer::new(&[]);
        hac.analyze();
        assert!(hac.clusters().is_empty());
    }

    #[test]
    fn test_dot_export() {
        let types = types();
        let mut hac = HierarchicalClusterer::new(&types);
        hac.analyze();
        let dot = hac.to_dot("corpus");
        assert!(dot.starts_with("digraph \"corpus\" {"));
        assert_eq!(dot.matches(" -> ").count(), 6);
        assert!(dot.contains("label=\"d\""));
    }
}

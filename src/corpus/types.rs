//! Corpus data types: clustered Types and suffix-tree Nodes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A document or category unit being clustered.
///
/// Identity, equality and ordering are by `id` alone; the label and the
/// node-frequency vector are payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Type {
    pub id: u32,
    pub label: String,
    /// How often the type's suffixes pass through each node, keyed by node number.
    #[serde(default)]
    pub node_frequencies: BTreeMap<u32, f64>,
}

impl Type {
    pub fn new(id: u32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            node_frequencies: BTreeMap::new(),
        }
    }

    pub fn with_frequency(mut self, node_number: u32, frequency: f64) -> Self {
        self.node_frequencies.insert(node_number, frequency);
        self
    }

    /// Euclidean norm of the node-frequency vector.
    pub fn norm(&self) -> f64 {
        self.node_frequencies
            .values()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Type {}

impl PartialOrd for Type {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Type {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// An internal suffix-tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_number: u32,
    /// Occurrence count of each type below this node, keyed by type id.
    #[serde(default)]
    pub type_frequencies: BTreeMap<u32, u32>,
}

impl Node {
    pub fn new(node_number: u32) -> Self {
        Self {
            node_number,
            type_frequencies: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, type_id: u32, count: u32) -> Self {
        self.type_frequencies.insert(type_id, count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_type_identity_is_id() {
        let a = Type::new(1, "alpha").with_frequency(2, 1.0);
        let b = Type::new(1, "renamed");
        assert_eq!(a, b);

        let set: BTreeSet<Type> = [Type::new(3, "c"), Type::new(1, "a"), Type::new(2, "b")]
            .into_iter()
            .collect();
        let ids: Vec<u32> = set.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_type_norm() {
        let t = Type::new(0, "t").with_frequency(2, 3.0).with_frequency(3, 4.0);
        assert!((t.norm() - 5.0).abs() < 1e-12);
        assert_eq!(Type::new(1, "empty").norm(), 0.0);
    }

    #[test]
    fn test_serde_field_names() {
        let node = Node::new(4).with_type(1, 2);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["nodeNumber"], 4);
        assert_eq!(json["typeFrequencies"]["1"], 2);
    }
}

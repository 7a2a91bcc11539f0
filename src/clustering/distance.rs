//! Pairwise dissimilarity between types.

use crate::corpus::Type;

/// Cosine distance over the sparse node-frequency vectors, in `[0, 1]` for
/// non-negative frequencies.
///
/// Two empty vectors are identical (distance 0); an empty vector is
/// maximally distant from a non-empty one.
pub fn cosine_distance(a: &Type, b: &Type) -> f64 {
    let (na, nb) = (a.norm(), b.norm());
    if na == 0.0 || nb == 0.0 {
        return if na == nb { 0.0 } else { 1.0 };
    }
    let dot: f64 = a
        .node_frequencies
        .iter()
        .filter_map(|(node, va)| b.node_frequencies.get(node).map(|vb| va * vb))
        .sum();
    (1.0 - dot / (na * nb)).clamp(0.0, 1.0)
}

/// Dense symmetric distance matrix over a slice of types.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(types: &[Type]) -> Self {
        let n = types.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = cosine_distance(&types[i], &types[j]);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    /// Rows as owned vectors, for algorithms that grow the matrix.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values.chunks(self.n.max(1)).take(self.n).map(<[f64]>::to_vec).collect()
    }
}

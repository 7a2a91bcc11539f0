//! Neighbor joining (Saitou & Nei) producing an unrooted tree in Newick form.

use crate::clustering::distance::DistanceMatrix;
use crate::clustering::render::{newick_label, newick_length};
use crate::corpus::Type;

pub struct NeighborJoining<'a> {
    types: &'a [Type],
    tree: Option<String>,
}

impl<'a> NeighborJoining<'a> {
    pub fn new(types: &'a [Type]) -> Self {
        Self { types, tree: None }
    }

    /// Build the tree.
    pub fn start(&mut self) {
        let mut labels: Vec<String> = self.types.iter().map(|t| newick_label(&t.label)).collect();
        let mut dist = DistanceMatrix::new(self.types).to_rows();

        while labels.len() > 2 {
            let r = labels.len();
            let sums: Vec<f64> = dist.iter().map(|row| row.iter().sum()).collect();

            let mut best = (0, 1, f64::INFINITY);
            for i in 0..r {
                for j in (i + 1)..r {
                    let q = (r as f64 - 2.0) * dist[i][j] - sums[i] - sums[j];
                    if q < best.2 {
                        best = (i, j, q);
                    }
                }
            }
            let (i, j, _) = best;

            let dij = dist[i][j];
            let li = 0.5 * dij + (sums[i] - sums[j]) / (2.0 * (r as f64 - 2.0));
            let lj = dij - li;
            let joined = format!(
                "({}:{},{}:{})",
                labels[i],
                newick_length(li),
                labels[j],
                newick_length(lj)
            );

            let new_row: Vec<f64> = (0..r)
                .filter(|&k| k != i && k != j)
                .map(|k| 0.5 * (dist[i][k] + dist[j][k] - dij))
                .collect();

            // j > i, so removing j first keeps i valid.
            for idx in [j, i] {
                labels.remove(idx);
                dist.remove(idx);
                for row in &mut dist {
                    row.remove(idx);
                }
            }
            for (row, d) in dist.iter_mut().zip(&new_row) {
                row.push(*d);
            }
            let mut last = new_row;
            last.push(0.0);
            dist.push(last);
            labels.push(joined);
        }

        let tree = match labels.as_slice() {
            [] => ";".to_string(),
            [only] => format!("{};", only),
            // The loop leaves at most two subtrees.
            [a, b, ..] => {
                let half = newick_length(dist[0][1] / 2.0);
                format!("({}:{},{}:{});", a, half, b, half)
            }
        };
        self.tree = Some(tree);
    }

    /// Newick string of the last `start` call (`;` before that).
    pub fn tree(&self) -> &str {
        self.tree.as_deref().unwrap_or(";")
    }
}

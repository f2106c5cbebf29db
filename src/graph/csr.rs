//! Compressed-sparse-row adjacency structures.

use serde::{Deserialize, Serialize};

/// A compressed-sparse-row graph adjacency matrix.
///
/// Row ordering matches the node-id index established at `GraphStore::load`
/// time and must remain stable for the life of the handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Csr<T> {
    /// `row_offsets[i]..row_offsets[i+1]` indexes into `col_indices`/`values`
    /// for row `i`. Length `num_nodes + 1`.
    pub row_offsets: Vec<u32>,
    /// Column (target node) indices, grouped by row.
    pub col_indices: Vec<u32>,
    /// Per-edge value (weight, or a unit count for unweighted views).
    pub values: Vec<T>,
    /// Number of nodes (rows).
    pub num_nodes: u32,
}

impl<T: Copy + Default> Csr<T> {
    /// Build a CSR from an unsorted edge list `(row, col, value)`.
    /// Rows/cols must already be dense node indices in `0..num_nodes`.
    pub fn from_triples(num_nodes: u32, mut triples: Vec<(u32, u32, T)>) -> Self {
        triples.sort_by_key(|(r, c, _)| (*r, *c));

        let mut row_offsets = vec![0u32; num_nodes as usize + 1];
        for (r, _, _) in &triples {
            row_offsets[*r as usize + 1] += 1;
        }
        for i in 1..row_offsets.len() {
            row_offsets[i] += row_offsets[i - 1];
        }

        let col_indices = triples.iter().map(|(_, c, _)| *c).collect();
        let values = triples.iter().map(|(_, _, v)| *v).collect();

        Self {
            row_offsets,
            col_indices,
            values,
            num_nodes,
        }
    }

    /// Iterate the `(target, value)` pairs of one row.
    pub fn row(&self, node: u32) -> impl Iterator<Item = (u32, T)> + '_ {
        let start = self.row_offsets[node as usize] as usize;
        let end = self.row_offsets[node as usize + 1] as usize;
        self.col_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter().copied())
    }

    /// Out-degree (row length) of a node.
    pub fn degree(&self, node: u32) -> u32 {
        self.row_offsets[node as usize + 1] - self.row_offsets[node as usize]
    }

    /// Total number of stored entries.
    pub fn nnz(&self) -> usize {
        self.col_indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_stable_row_ordering() {
        let csr = Csr::from_triples(3, vec![(0, 2, 1u32), (0, 1, 1), (1, 2, 1)]);
        let row0: Vec<_> = csr.row(0).map(|(c, _)| c).collect();
        assert_eq!(row0, vec![1, 2]);
        assert_eq!(csr.degree(0), 2);
        assert_eq!(csr.degree(2), 0);
        assert_eq!(csr.nnz(), 3);
    }
}

//! Pairwise sequence divergence.
//!
//! Binning only needs one question answered: how far apart are two
//! sequences? [DivergenceSource] abstracts over where the answer comes from:
//! * [DivergenceMatrix] - explicit values, e.g. p-distances of an [Alignment]
//! * [PatristicDivergence] - path lengths between the leaves of a [Tree]

use crate::alignment::{is_gap, Alignment};
use crate::error::EcotypeError;
use crate::model::Tree;
use rayon::prelude::*;
use std::collections::HashMap;

// =#========================================================================#=
// DIVERGENCE SOURCE (Trait)
// =#========================================================================#=
/// Provides the divergence (fraction of differing sites, or an equivalent
/// distance) between two named sequences.
pub trait DivergenceSource {
    /// Returns the divergence between `a` and `b`, or `None` if either name
    /// is unknown to this source.
    fn divergence(&self, a: &str, b: &str) -> Option<f64>;
}

impl<T: DivergenceSource + ?Sized> DivergenceSource for &T {
    fn divergence(&self, a: &str, b: &str) -> Option<f64> {
        (**self).divergence(a, b)
    }
}

// =#========================================================================#=
// DIVERGENCE MATRIX
// =#========================================================================#=
/// A list of sequence names together with a square matrix of pairwise
/// divergences.
///
/// Values are stored as given; consistency (finite, non-negative,
/// symmetric) is checked where it matters, by
/// [Binning](crate::binning::Binning).
///
/// # Example
/// ```
/// use ecotype::divergence::{DivergenceMatrix, DivergenceSource};
///
/// // Lower triangle without diagonal
/// let matrix = DivergenceMatrix::new(
///     vec!["A".to_string(), "B".to_string(), "C".to_string()],
///     vec![vec![], vec![0.1], vec![0.3, 0.2]],
/// ).unwrap();
/// assert_eq!(matrix.divergence("C", "A"), Some(0.3));
/// assert_eq!(matrix.divergence("A", "C"), Some(0.3));
/// assert_eq!(matrix.divergence("A", "D"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceMatrix {
    names: Vec<String>,
    positions: HashMap<String, usize>,
    /// Row-major `n x n` values
    values: Vec<f64>,
}

impl DivergenceMatrix {
    /// Creates a new divergence matrix.
    ///
    /// `rows` must have as many rows as there are `names` and be either
    /// square or lower triangular without the diagonal (row `i` holding
    /// `i` values). Triangular input is mirrored; the diagonal is zero.
    ///
    /// # Errors
    /// [EcotypeError::InconsistentBinning] if the shape does not match the
    /// names, or a name occurs twice.
    pub fn new(names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, EcotypeError> {
        let n = names.len();
        if rows.len() != n {
            return Err(EcotypeError::InconsistentBinning(format!(
                "{} names but {} matrix rows",
                n,
                rows.len()
            )));
        }

        let square = rows.iter().all(|row| row.len() == n);
        let lower = rows.iter().enumerate().all(|(i, row)| row.len() == i);
        let mut values = vec![0.0; n * n];
        if square {
            for (i, row) in rows.iter().enumerate() {
                values[i * n..(i + 1) * n].copy_from_slice(row);
            }
        } else if lower {
            for (i, row) in rows.iter().enumerate() {
                for (j, &value) in row.iter().enumerate() {
                    values[i * n + j] = value;
                    values[j * n + i] = value;
                }
            }
        } else {
            return Err(EcotypeError::InconsistentBinning(
                "matrix is neither square nor lower triangular".to_string(),
            ));
        }

        Self::from_parts(names, values)
    }

    /// Computes p-distances between all sequences of an alignment: the
    /// fraction of differing sites among the columns where neither sequence
    /// has a gap. Pairs are computed in parallel.
    ///
    /// A pair without any comparable column gets an undefined (NaN)
    /// divergence, which binning reports.
    pub fn from_alignment(alignment: &Alignment) -> Self {
        let n = alignment.len();
        let rows = alignment.rows();

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect();
        let distances: Vec<((usize, usize), f64)> = pairs
            .par_iter()
            .map(|&(i, j)| ((i, j), p_distance(&rows[i], &rows[j])))
            .collect();

        let mut values = vec![0.0; n * n];
        for ((i, j), distance) in distances {
            values[i * n + j] = distance;
            values[j * n + i] = distance;
        }

        let names = alignment.identifiers().to_vec();
        let positions = index_names(&names);
        Self {
            names,
            positions,
            values,
        }
    }

    fn from_parts(names: Vec<String>, values: Vec<f64>) -> Result<Self, EcotypeError> {
        let positions = index_names(&names);
        if positions.len() != names.len() {
            return Err(EcotypeError::InconsistentBinning(
                "duplicate sequence name in divergence matrix".to_string(),
            ));
        }
        Ok(Self {
            names,
            positions,
            values,
        })
    }

    /// Returns the sequence names in matrix order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of sequences.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the matrix holds no sequences.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the value at row `i`, column `j`.
    ///
    /// # Panics
    /// Panics if an index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let n = self.names.len();
        assert!(i < n && j < n, "index ({i}, {j}) out of bounds for {n} sequences");
        self.values[i * n + j]
    }
}

impl DivergenceSource for DivergenceMatrix {
    fn divergence(&self, a: &str, b: &str) -> Option<f64> {
        let i = *self.positions.get(a)?;
        let j = *self.positions.get(b)?;
        Some(self.values[i * self.names.len() + j])
    }
}

fn index_names(names: &[String]) -> HashMap<String, usize> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

#[inline]
fn p_distance(a: &[u8], b: &[u8]) -> f64 {
    let (compared, differences) = a
        .iter()
        .zip(b)
        .filter(|&(&x, &y)| !is_gap(x) && !is_gap(y))
        .fold((0usize, 0usize), |(compared, differences), (x, y)| {
            (compared + 1, differences + usize::from(x != y))
        });

    if compared == 0 {
        f64::NAN
    } else {
        differences as f64 / compared as f64
    }
}

// =#========================================================================#=
// PATRISTIC DIVERGENCE
// =#========================================================================#=
/// Divergences read off a tree: the sum of branch lengths on the path
/// between two leaves.
///
/// # Example
/// ```
/// use ecotype::divergence::{DivergenceSource, PatristicDivergence};
/// use ecotype::newick::parse_str;
///
/// let tree = parse_str("(A:0.1,(B:0.05,C:0.02):0.03);").unwrap();
/// let divergence = PatristicDivergence::new(&tree);
/// let ab = divergence.divergence("A", "B").unwrap();
/// assert!((ab - 0.18).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PatristicDivergence {
    matrix: DivergenceMatrix,
}

impl PatristicDivergence {
    /// Computes the path lengths between all pairs of leaves of `tree`.
    pub fn new(tree: &Tree) -> Self {
        let leaves: Vec<usize> = tree.leaves().iter().map(|leaf| leaf.index()).collect();
        let n = leaves.len();

        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in i + 1..n {
                let distance = tree.patristic_distance(leaves[i], leaves[j]);
                values[i * n + j] = distance;
                values[j * n + i] = distance;
            }
        }

        let names = tree.leaf_names();
        let positions = index_names(&names);
        Self {
            matrix: DivergenceMatrix {
                names,
                positions,
                values,
            },
        }
    }

    /// Returns the underlying matrix of leaf-to-leaf distances.
    pub fn matrix(&self) -> &DivergenceMatrix {
        &self.matrix
    }
}

impl DivergenceSource for PatristicDivergence {
    fn divergence(&self, a: &str, b: &str) -> Option<f64> {
        self.matrix.divergence(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_and_lower_agree() {
        let names = vec!["a".to_string(), "b".to_string()];
        let square = DivergenceMatrix::new(names.clone(), vec![vec![0.0, 0.4], vec![0.4, 0.0]]).unwrap();
        let lower = DivergenceMatrix::new(names, vec![vec![], vec![0.4]]).unwrap();
        assert_eq!(square, lower);
        assert_eq!(lower.get(0, 1), 0.4);
    }

    #[test]
    fn test_invalid_shapes() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(DivergenceMatrix::new(names.clone(), vec![vec![0.0, 0.4]]).is_err());
        assert!(DivergenceMatrix::new(names, vec![vec![0.0], vec![0.4, 0.0, 1.0]]).is_err());
        let duplicate = vec!["a".to_string(), "a".to_string()];
        assert!(DivergenceMatrix::new(duplicate, vec![vec![], vec![0.4]]).is_err());
    }

    #[test]
    fn test_p_distance_ignores_gaps() {
        let alignment = Alignment::from_fasta_str(">a\nACGT\n>b\nACGA\n>c\nAC--\n").unwrap();
        let matrix = DivergenceMatrix::from_alignment(&alignment);
        assert_eq!(matrix.divergence("a", "b"), Some(0.25));
        assert_eq!(matrix.divergence("a", "c"), Some(0.0));
        assert_eq!(matrix.divergence("b", "a"), Some(0.25));
        assert_eq!(matrix.divergence("a", "a"), Some(0.0));
    }
}

//! Ecotype is a library to demarcate ecotypes, putative ecologically
//! distinct populations of bacteria, on a phylogeny of their sequences.
//!
//! Core functionality provided:
//! - Newick: Parse and write rooted phylogenies with any number of children
//!   per node, see [crate::newick].
//! - Tree model: An arena-based [Tree] that can be rerooted at an outgroup,
//!   pruned and canonically sorted, see [crate::model].
//! - Alignment: Read FASTA alignments, drop gap columns and derive the
//!   analysed sequence length, see [crate::alignment].
//! - Divergence: Pairwise divergences from a matrix, an alignment
//!   (p-distances) or the tree itself (path lengths), see [crate::divergence].
//! - Binning: Single-linkage clustering of sequences at a series of
//!   divergence cutoffs, see [crate::binning].
//! - Estimation: Initial guesses of the ecotype model parameters
//!   (npop, omega, sigma) from a two-segment fit of the clustering curve,
//!   see [crate::estimate].
//! - Demarcation: Recursive top-down splitting of the tree into ecotypes,
//!   guided by an external confidence-interval computation,
//!   see [crate::demarcation].
//!
//! # Usage patterns
//!
//! ## Parameter estimate for a tree
//! ```
//! use ecotype::binning::Binning;
//! use ecotype::divergence::PatristicDivergence;
//! use ecotype::estimate::CurveEstimator;
//!
//! let tree = ecotype::parse_newick_str(
//!     "(((A:0.001,B:0.002):0.01,(C:0.003,D:0.004):0.02):0.05,((E:0.005,F:0.006):0.03,G:0.04):0.06);",
//! ).unwrap();
//! let leaves = tree.leaf_names();
//!
//! let binning = Binning::new(PatristicDivergence::new(&tree));
//! let levels = binning.compute_bin_levels(&leaves).unwrap();
//! let fit = CurveEstimator::new().estimate(&levels, 1000, leaves.len()).unwrap();
//! assert!(fit.estimate.npop >= 1);
//! ```
//!
//! ## Demarcation
//! ```
//! use ecotype::demarcation::{ConfidenceInterval, Demarcator};
//! use ecotype::divergence::PatristicDivergence;
//! use ecotype::error::OracleError;
//! use ecotype::estimate::ParameterEstimate;
//!
//! let tree = ecotype::parse_newick_str("(Out:0.5,(A:0.01,B:0.01):0.2);").unwrap();
//! let demarcator = Demarcator::new(PatristicDivergence::new(&tree), 1000);
//!
//! // Stand-in for a likelihood-based computation
//! let mut oracle = |estimate: &ParameterEstimate, _: usize| {
//!     Ok::<_, OracleError>(ConfidenceInterval::new(1.0, estimate.npop as f64))
//! };
//! let demarcation = demarcator.demarcate(tree, "Out", &[], &mut oracle).unwrap();
//! // Two leaves give no usable curve, so the pair is split into single leaves
//! let ecotypes = demarcation.into_ecotypes().unwrap();
//! assert_eq!(ecotypes.len(), 2);
//! assert_eq!(ecotypes[0].leaves, vec!["A"]);
//! ```

pub mod alignment;
pub mod binning;
pub mod demarcation;
pub mod divergence;
pub mod error;
pub mod estimate;
pub mod model;
pub mod newick;
pub mod parser;

pub use crate::error::{EcotypeError, OracleError};
pub use crate::model::Tree;

use std::path::Path;

// ============================================================================
// Quick Newick API
// ============================================================================
/// Parse a Newick string using default settings, returning a [Tree].
///
/// See [`newick::parse_str`] for full documentation of this convenience function.
pub fn parse_newick_str<S: AsRef<str>>(newick: S) -> Result<Tree, EcotypeError> {
    newick::parse_str(newick)
}

/// Parse a file containing a semicolon-separated list of Newick strings
/// using default settings, returning all trees.
///
/// See [`newick::parse_file`] for full documentation of this convenience function.
pub fn parse_newick_file<P: AsRef<Path>>(path: P) -> Result<Vec<Tree>, EcotypeError> {
    newick::parse_file(path)
}

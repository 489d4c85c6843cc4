//! Error taxonomy of the ecotype analysis.
//!
//! Parser-level problems are reported as [ParsingError] (position plus
//! context) and wrapped into [EcotypeError] at the crate boundary.
//! Failures of the external confidence-interval oracle are [OracleError].

use crate::parser::ParsingError;
use thiserror::Error;

/// Errors of tree handling, binning, curve estimation and demarcation.
#[derive(Error, Debug)]
pub enum EcotypeError {
    /// Unparsable or structurally invalid Newick input.
    #[error("malformed tree: {0}")]
    MalformedTree(#[from] ParsingError),

    /// Unparsable or inconsistent FASTA alignment.
    #[error("malformed alignment: {0}")]
    MalformedAlignment(#[source] ParsingError),

    /// A named leaf (reroot target, outgroup, pruned leaf) is not in the tree.
    #[error("no leaf named '{0}' in tree")]
    NotFound(String),

    /// Divergence data violates the assumptions of single-linkage binning.
    #[error("inconsistent binning: {0}")]
    InconsistentBinning(String),

    /// The binning curve has no usable two-line structure.
    #[error("degenerate fit: {0}")]
    DegenerateFit(String),

    /// The confidence-interval oracle did not produce a usable interval.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// A subtree could not be resolved into ecotypes.
    #[error("demarcation incomplete for subtree of {} leaves starting with {:?}: {cause}", .leaves.len(), .leaves.first())]
    DemarcationIncomplete {
        /// Leaves of the unresolved subtree (outgroup and recombinants excluded)
        leaves: Vec<String>,
        /// Why the subtree stayed unresolved
        #[source]
        cause: Box<EcotypeError>,
    },

    #[error("IO error - {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a confidence-interval oracle call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// The underlying optimizer or sampler did not converge.
    #[error("confidence interval did not converge: {0}")]
    NotConverged(String),

    /// The call was abandoned by the caller.
    #[error("confidence interval computation was cancelled")]
    Cancelled,

    /// The oracle answered with bounds that do not form an interval of ecotype counts.
    #[error("invalid confidence interval [{lower}, {upper}]")]
    InvalidInterval { lower: f64, upper: f64 },
}

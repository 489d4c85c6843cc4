//! Top-down demarcation of ecotypes on a phylogeny.
//!
//! Starting at the ingroup (the tree rerooted at the outgroup), every
//! subtree is binned, its clustering curve is fitted and an external
//! [ConfidenceOracle] is asked for a confidence interval on the number of
//! ecotypes. A subtree whose lower bound is one ecotype is emitted as an
//! [EcotypeGroup]; otherwise its children are examined in order.
//!
//! # Policies
//! * A subtree with a single remaining leaf is an ecotype without consulting
//!   the oracle.
//! * Leaves that are the outgroup or a recombinant are ignored everywhere;
//!   a subtree without remaining leaves contributes nothing.
//! * A subtree whose curve cannot be fitted (too few bin levels, as for
//!   every two-leaf subtree) is split without asking the oracle, so the
//!   descent always ends at single leaves.
//! * A subtree for which the oracle fails is recorded as an
//!   [UnresolvedSubtree]; its siblings are still demarcated. Inconsistent
//!   divergence data aborts the whole run.
//! * The oracle call is the only cancellation point: once the cancel flag
//!   of the [Demarcator] is set, every subtree still to be asked becomes
//!   unresolved with [OracleError::Cancelled].

use crate::binning::{Binning, BinningConfig};
use crate::divergence::DivergenceSource;
use crate::error::{EcotypeError, OracleError};
use crate::estimate::{CurveEstimator, EstimatorConfig, ParameterEstimate};
use crate::model::{NodeIndex, Tree};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// =#========================================================================#=
// ORACLE
// =#========================================================================#=
/// Confidence range `[lower, upper]` on the number of ecotypes in a subtree.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Returns `true` if the lower bound is exactly one ecotype.
    pub fn is_single_ecotype(&self) -> bool {
        (self.lower - 1.0).abs() < f64::EPSILON
    }

    /// Checks that both bounds are finite and ordered.
    ///
    /// # Errors
    /// [OracleError::InvalidInterval] otherwise.
    pub fn validate(self) -> Result<Self, OracleError> {
        if self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper {
            Ok(self)
        } else {
            Err(OracleError::InvalidInterval {
                lower: self.lower,
                upper: self.upper,
            })
        }
    }
}

/// External computation of the confidence interval on the number of
/// ecotypes, typically backed by likelihood sampling.
///
/// Implemented for closures, so that a simple oracle needs no type:
/// ```
/// use ecotype::demarcation::{ConfidenceInterval, ConfidenceOracle};
/// use ecotype::error::OracleError;
/// use ecotype::estimate::ParameterEstimate;
///
/// let mut oracle = |estimate: &ParameterEstimate, _num_sequences: usize| {
///     Ok::<_, OracleError>(ConfidenceInterval::new(1.0, estimate.npop as f64))
/// };
/// let estimate = ParameterEstimate { npop: 4, omega: 0.1, sigma: 2.0, likelihood: None };
/// let interval = oracle.confidence_interval(&estimate, 12).unwrap();
/// assert!(interval.is_single_ecotype());
/// ```
pub trait ConfidenceOracle {
    /// Returns the confidence interval for a subtree of `num_sequences`
    /// sequences with the given initial parameter guesses.
    fn confidence_interval(
        &mut self,
        estimate: &ParameterEstimate,
        num_sequences: usize,
    ) -> Result<ConfidenceInterval, OracleError>;
}

impl<F> ConfidenceOracle for F
where
    F: FnMut(&ParameterEstimate, usize) -> Result<ConfidenceInterval, OracleError>,
{
    fn confidence_interval(
        &mut self,
        estimate: &ParameterEstimate,
        num_sequences: usize,
    ) -> Result<ConfidenceInterval, OracleError> {
        self(estimate, num_sequences)
    }
}

// =#========================================================================#=
// RESULT TYPES
// =#========================================================================#=
/// Leaf names assigned to one ecotype, in tree order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EcotypeGroup {
    pub leaves: Vec<String>,
}

impl EcotypeGroup {
    pub fn new(leaves: Vec<String>) -> Self {
        Self { leaves }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn contains(&self, leaf: &str) -> bool {
        self.leaves.iter().any(|l| l == leaf)
    }
}

/// What the demarcation concluded for one subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Decision {
    /// Emitted as one ecotype
    SingleEcotype,
    /// Children were examined, the oracle asked for more than one ecotype
    Split,
    /// Children were examined, the curve could not be fitted
    Degenerate,
    /// Left unresolved, see [Demarcation::unresolved]
    Unresolved,
}

/// Diagnostic record of one examined subtree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemarcationStep {
    /// Remaining leaves of the subtree
    pub leaves: Vec<String>,
    /// Parameter guesses, `None` for single leaves and degenerate curves
    pub estimate: Option<ParameterEstimate>,
    /// Oracle answer, `None` if the oracle was not asked or failed
    pub interval: Option<ConfidenceInterval>,
    pub decision: Decision,
}

/// A subtree that could not be demarcated, and why.
#[derive(Debug)]
pub struct UnresolvedSubtree {
    /// Remaining leaves of the subtree
    pub leaves: Vec<String>,
    /// [EcotypeError::Oracle]
    pub cause: EcotypeError,
}

/// Outcome of a demarcation run.
///
/// Ecotypes, unresolved subtrees, the outgroup and the recombinants
/// together cover every leaf of the tree exactly once.
#[derive(Debug)]
pub struct Demarcation {
    ecotypes: Vec<EcotypeGroup>,
    unresolved: Vec<UnresolvedSubtree>,
    steps: Vec<DemarcationStep>,
    outgroup: String,
    recombinants: Vec<String>,
}

impl Demarcation {
    /// Returns the ecotypes in tree order.
    pub fn ecotypes(&self) -> &[EcotypeGroup] {
        &self.ecotypes
    }

    /// Returns the subtrees left unresolved, in tree order.
    pub fn unresolved(&self) -> &[UnresolvedSubtree] {
        &self.unresolved
    }

    /// Returns the examined subtrees in the order they were examined.
    pub fn steps(&self) -> &[DemarcationStep] {
        &self.steps
    }

    pub fn outgroup(&self) -> &str {
        &self.outgroup
    }

    /// Returns the recombinant leaves present in the tree, in tree order.
    pub fn recombinants(&self) -> &[String] {
        &self.recombinants
    }

    /// Returns `true` if every subtree was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Returns the ecotypes of a complete demarcation.
    ///
    /// # Errors
    /// [EcotypeError::DemarcationIncomplete] for the first unresolved subtree.
    pub fn into_ecotypes(mut self) -> Result<Vec<EcotypeGroup>, EcotypeError> {
        if self.unresolved.is_empty() {
            return Ok(self.ecotypes);
        }
        let first = self.unresolved.swap_remove(0);
        Err(EcotypeError::DemarcationIncomplete {
            leaves: first.leaves,
            cause: Box::new(first.cause),
        })
    }
}

/// Returns the leaves of `tree` whose names are not among the
/// `sequence_ids` of the analysed sequences, in leaf order.
pub fn find_recombinants(tree: &Tree, sequence_ids: &[String]) -> Vec<String> {
    let ids: HashSet<&str> = sequence_ids.iter().map(String::as_str).collect();
    tree.leaf_names()
        .into_iter()
        .filter(|name| !ids.contains(name.as_str()))
        .collect()
}

// =#========================================================================#=
// DEMARCATOR
// =#========================================================================#=
/// Configuration of a [Demarcator].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemarcationConfig {
    pub binning: BinningConfig,
    pub estimator: EstimatorConfig,
}

/// Runs demarcations over a divergence source for sequences of a fixed
/// (gap-free) length.
#[derive(Debug, Clone)]
pub struct Demarcator<D: DivergenceSource> {
    binning: Binning<D>,
    estimator: CurveEstimator,
    sequence_length: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<D: DivergenceSource> Demarcator<D> {
    /// Creates a demarcator with default binning and estimation settings.
    pub fn new(source: D, sequence_length: usize) -> Self {
        Self {
            binning: Binning::new(source),
            estimator: CurveEstimator::new(),
            sequence_length,
            cancel: None,
        }
    }

    /// Replaces binning and estimation settings.
    pub fn with_config(mut self, config: DemarcationConfig) -> Self {
        self.binning = self.binning.with_config(config.binning);
        self.estimator = self.estimator.with_config(config.estimator);
        self
    }

    /// Registers a flag which, once set, stops all further oracle calls.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Demarcates the ecotypes of `tree`.
    ///
    /// The tree is rerooted at `outgroup` and examined from the ingroup
    /// downwards; see the [module documentation](self) for the policies.
    ///
    /// # Errors
    /// * [EcotypeError::NotFound] if the tree has no leaf `outgroup`
    /// * [EcotypeError::InconsistentBinning] if the divergence data is
    ///   missing or invalid for some leaves
    pub fn demarcate<O: ConfidenceOracle + ?Sized>(
        &self,
        mut tree: Tree,
        outgroup: &str,
        recombinants: &[String],
        oracle: &mut O,
    ) -> Result<Demarcation, EcotypeError> {
        tree.reroot(outgroup)?;

        let excluded: HashSet<&str> = recombinants
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(outgroup))
            .collect();
        let mut demarcation = Demarcation {
            ecotypes: Vec::new(),
            unresolved: Vec::new(),
            steps: Vec::new(),
            outgroup: outgroup.to_string(),
            recombinants: tree
                .leaf_names()
                .into_iter()
                .filter(|name| name != outgroup && recombinants.contains(name))
                .collect(),
        };

        // Depth-first, children in order; the outgroup leaf yields no leaves
        let mut stack: Vec<NodeIndex> = tree.root().children().iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            let leaves: Vec<String> = tree
                .descendant_leaves(node)
                .iter()
                .map(|leaf| leaf.name())
                .filter(|name| !excluded.contains(name))
                .map(str::to_string)
                .collect();
            if leaves.is_empty() {
                continue;
            }

            if leaves.len() == 1 {
                demarcation.push_ecotype(leaves, None, None);
                continue;
            }

            match self.evaluate(&leaves, oracle) {
                Ok((estimate, interval)) if interval.is_single_ecotype() => {
                    demarcation.push_ecotype(leaves, Some(estimate), Some(interval));
                }
                Ok((estimate, interval)) => {
                    demarcation.steps.push(DemarcationStep {
                        leaves,
                        estimate: Some(estimate),
                        interval: Some(interval),
                        decision: Decision::Split,
                    });
                    stack.extend(tree[node].children().iter().rev());
                }
                Err(Evaluation { error: EcotypeError::InconsistentBinning(msg), .. }) => {
                    return Err(EcotypeError::InconsistentBinning(msg));
                }
                Err(Evaluation { error: EcotypeError::DegenerateFit(_), .. }) => {
                    demarcation.steps.push(DemarcationStep {
                        leaves,
                        estimate: None,
                        interval: None,
                        decision: Decision::Degenerate,
                    });
                    // Two or more remaining leaves, so `node` is internal
                    stack.extend(tree[node].children().iter().rev());
                }
                Err(Evaluation { estimate, error }) => {
                    demarcation.steps.push(DemarcationStep {
                        leaves: leaves.clone(),
                        estimate,
                        interval: None,
                        decision: Decision::Unresolved,
                    });
                    demarcation.unresolved.push(UnresolvedSubtree { leaves, cause: error });
                }
            }
        }

        Ok(demarcation)
    }

    /// Bins and fits the subtree of `leaves`, then asks the oracle.
    fn evaluate<O: ConfidenceOracle + ?Sized>(
        &self,
        leaves: &[String],
        oracle: &mut O,
    ) -> Result<(ParameterEstimate, ConfidenceInterval), Evaluation> {
        let levels = self.binning.compute_bin_levels(leaves)?;
        let fit = self
            .estimator
            .estimate(&levels, self.sequence_length, leaves.len())?;
        let estimate = fit.estimate;

        let failed = |error: OracleError| Evaluation {
            estimate: Some(estimate),
            error: EcotypeError::Oracle(error),
        };
        if self.is_cancelled() {
            return Err(failed(OracleError::Cancelled));
        }
        let interval = oracle
            .confidence_interval(&estimate, leaves.len())
            .and_then(ConfidenceInterval::validate)
            .map_err(failed)?;

        Ok((estimate, interval))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl Demarcation {
    fn push_ecotype(
        &mut self,
        leaves: Vec<String>,
        estimate: Option<ParameterEstimate>,
        interval: Option<ConfidenceInterval>,
    ) {
        self.steps.push(DemarcationStep {
            leaves: leaves.clone(),
            estimate,
            interval,
            decision: Decision::SingleEcotype,
        });
        self.ecotypes.push(EcotypeGroup::new(leaves));
    }
}

/// Failed evaluation of a subtree, with the estimate if one was reached.
struct Evaluation {
    estimate: Option<ParameterEstimate>,
    error: EcotypeError,
}

impl From<EcotypeError> for Evaluation {
    fn from(error: EcotypeError) -> Self {
        Self {
            estimate: None,
            error,
        }
    }
}

// =#========================================================================#=
// INDEPENDENT RUNS
// =#========================================================================#=
/// Input of one demarcation run of [demarcate_trees].
#[derive(Debug, Clone)]
pub struct DemarcationJob {
    pub tree: Tree,
    pub outgroup: String,
    pub recombinants: Vec<String>,
}

/// Demarcates several trees in parallel.
///
/// Each run owns its tree and gets its own oracle from `make_oracle`, which
/// receives the position of the job. Results are in job order.
pub fn demarcate_trees<D, O, F>(
    demarcator: &Demarcator<D>,
    jobs: Vec<DemarcationJob>,
    make_oracle: F,
) -> Vec<Result<Demarcation, EcotypeError>>
where
    D: DivergenceSource + Sync,
    O: ConfidenceOracle,
    F: Fn(usize) -> O + Sync,
{
    jobs.into_par_iter()
        .enumerate()
        .map(|(i, job)| {
            let mut oracle = make_oracle(i);
            demarcator.demarcate(job.tree, &job.outgroup, &job.recombinants, &mut oracle)
        })
        .collect()
}

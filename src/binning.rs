//! Single-linkage binning of sequences.
//!
//! For a set of leaves, [Binning] clusters sequences at a series of
//! divergence cutoffs: two sequences share a bin whenever a chain of pairs,
//! each at most the cutoff apart, connects them. The number of bins per
//! cutoff forms the clustering curve ([BinLevel]s) that the
//! [CurveEstimator](crate::estimate::CurveEstimator) fits.

use crate::divergence::DivergenceSource;
use crate::error::EcotypeError;

/// Largest accepted asymmetry `|d(a,b) - d(b,a)|` of a divergence source
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Default divergence cutoffs, the complements of the classic sequence
/// identity criteria from 50% to 100%.
pub const DEFAULT_THRESHOLDS: [f64; 20] = [
    0.50, 0.45, 0.40, 0.35, 0.30, 0.25, 0.20, 0.15, 0.10, 0.09, 0.08, 0.07, 0.06, 0.05, 0.04,
    0.03, 0.02, 0.01, 0.005, 0.0,
];

// =#========================================================================#=
// BIN LEVEL
// =#========================================================================#=
/// One point of the clustering curve: the number of bins formed at a
/// divergence cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinLevel {
    /// Divergence cutoff, in `[0, 1]`
    pub threshold: f64,
    /// Number of bins at this cutoff, at least 1
    pub cluster_count: usize,
}

impl BinLevel {
    pub fn new(threshold: f64, cluster_count: usize) -> Self {
        Self {
            threshold,
            cluster_count,
        }
    }
}

/// Keeps the first and the last level of every run of consecutive levels with
/// equal cluster count, dropping the interior of each plateau.
///
/// # Example
/// ```
/// use ecotype::binning::{collapse_plateaus, BinLevel};
///
/// let levels: Vec<BinLevel> = [(0.3, 1), (0.2, 2), (0.1, 2), (0.05, 2), (0.0, 5)]
///     .into_iter()
///     .map(|(t, c)| BinLevel::new(t, c))
///     .collect();
/// let thresholds: Vec<f64> = collapse_plateaus(&levels).iter().map(|l| l.threshold).collect();
/// assert_eq!(thresholds, vec![0.3, 0.2, 0.05, 0.0]);
/// ```
pub fn collapse_plateaus(levels: &[BinLevel]) -> Vec<BinLevel> {
    levels
        .iter()
        .enumerate()
        .filter(|&(i, level)| {
            let starts_run = i == 0 || levels[i - 1].cluster_count != level.cluster_count;
            let ends_run = i + 1 == levels.len() || levels[i + 1].cluster_count != level.cluster_count;
            starts_run || ends_run
        })
        .map(|(_, level)| *level)
        .collect()
}

// =#========================================================================#=
// BINNING CONFIG
// =#========================================================================#=
/// Configuration of the binning engine.
///
/// ```
/// use ecotype::binning::BinningConfig;
///
/// let config = BinningConfig {
///     thresholds: vec![0.0, 0.1, 0.05, 0.1],
/// };
/// assert_eq!(config.normalized_thresholds().unwrap(), vec![0.1, 0.05, 0.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinningConfig {
    /// Divergence cutoffs to bin at, in any order
    pub thresholds: Vec<f64>,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

impl BinningConfig {
    /// Returns the thresholds strictly descending and without duplicates.
    ///
    /// # Errors
    /// [EcotypeError::InconsistentBinning] if there is no threshold, or one
    /// is not a finite value within `[0, 1]`.
    pub fn normalized_thresholds(&self) -> Result<Vec<f64>, EcotypeError> {
        if self.thresholds.is_empty() {
            return Err(EcotypeError::InconsistentBinning(
                "no binning thresholds given".to_string(),
            ));
        }
        if let Some(t) = self
            .thresholds
            .iter()
            .find(|t| !t.is_finite() || **t < 0.0 || **t > 1.0)
        {
            return Err(EcotypeError::InconsistentBinning(format!(
                "binning threshold {t} is not within [0, 1]"
            )));
        }

        let mut thresholds = self.thresholds.clone();
        thresholds.sort_by(|a, b| b.total_cmp(a));
        thresholds.dedup();
        Ok(thresholds)
    }
}

// =#========================================================================#=
// BINNING ENGINE
// =#========================================================================#=
/// Single-linkage binning over a [DivergenceSource].
///
/// # Example
/// ```
/// use ecotype::binning::{Binning, BinningConfig};
/// use ecotype::divergence::DivergenceMatrix;
///
/// let names: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
/// let matrix = DivergenceMatrix::new(names.clone(), vec![vec![], vec![0.01], vec![0.2, 0.2]]).unwrap();
///
/// let binning = Binning::new(&matrix).with_config(BinningConfig {
///     thresholds: vec![0.3, 0.1, 0.0],
/// });
/// let counts: Vec<usize> = binning
///     .compute_bin_levels(&names)
///     .unwrap()
///     .iter()
///     .map(|level| level.cluster_count)
///     .collect();
/// assert_eq!(counts, vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct Binning<D: DivergenceSource> {
    source: D,
    config: BinningConfig,
}

impl<D: DivergenceSource> Binning<D> {
    /// Creates a binning engine with the default thresholds.
    pub fn new(source: D) -> Self {
        Self {
            source,
            config: BinningConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: BinningConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BinningConfig {
        &self.config
    }

    /// Returns the underlying divergence source.
    pub fn source(&self) -> &D {
        &self.source
    }

    /// Computes the clustering curve of the given leaves, one [BinLevel] per
    /// threshold, in descending threshold order.
    ///
    /// A single leaf yields one level with one bin. Plateaus are kept; see
    /// [collapse_plateaus] to thin them out.
    ///
    /// # Errors
    /// [EcotypeError::InconsistentBinning] if `leaf_names` is empty, the
    /// thresholds are invalid, or a divergence is missing, not finite,
    /// negative or asymmetric.
    pub fn compute_bin_levels(&self, leaf_names: &[String]) -> Result<Vec<BinLevel>, EcotypeError> {
        let thresholds = self.config.normalized_thresholds()?;
        if leaf_names.is_empty() {
            return Err(EcotypeError::InconsistentBinning(
                "cannot bin an empty set of sequences".to_string(),
            ));
        }
        if leaf_names.len() == 1 {
            return Ok(vec![BinLevel::new(thresholds[0], 1)]);
        }

        let mut edges = self.collect_edges(leaf_names)?;
        edges.sort_by(|a, b| a.divergence.total_cmp(&b.divergence));

        // Kruskal-style sweep over ascending thresholds
        let mut bins = UnionFind::new(leaf_names.len());
        let mut next_edge = 0;
        let mut levels: Vec<BinLevel> = Vec::with_capacity(thresholds.len());
        for &threshold in thresholds.iter().rev() {
            while next_edge < edges.len() && edges[next_edge].divergence <= threshold {
                bins.union(edges[next_edge].left, edges[next_edge].right);
                next_edge += 1;
            }
            levels.push(BinLevel::new(threshold, bins.count()));
        }
        levels.reverse();

        verify_monotone(&levels)?;
        Ok(levels)
    }

    /// Looks up and validates the divergence of every pair of leaves.
    fn collect_edges(&self, leaf_names: &[String]) -> Result<Vec<Edge>, EcotypeError> {
        let n = leaf_names.len();
        let mut edges = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                let (a, b) = (&leaf_names[i], &leaf_names[j]);
                let (Some(ab), Some(ba)) = (self.source.divergence(a, b), self.source.divergence(b, a))
                else {
                    return Err(EcotypeError::InconsistentBinning(format!(
                        "no divergence between '{a}' and '{b}'"
                    )));
                };
                if !ab.is_finite() || ab < 0.0 {
                    return Err(EcotypeError::InconsistentBinning(format!(
                        "divergence between '{a}' and '{b}' is {ab}, expected a finite non-negative value"
                    )));
                }
                if (ab - ba).abs() > SYMMETRY_TOLERANCE {
                    return Err(EcotypeError::InconsistentBinning(format!(
                        "divergence between '{a}' and '{b}' is asymmetric ({ab} vs {ba})"
                    )));
                }
                edges.push(Edge {
                    left: i,
                    right: j,
                    divergence: ab,
                });
            }
        }
        Ok(edges)
    }
}

/// Checks that cluster counts never increase with the threshold and never drop to zero.
fn verify_monotone(levels: &[BinLevel]) -> Result<(), EcotypeError> {
    if let Some(level) = levels.iter().find(|level| level.cluster_count == 0) {
        return Err(EcotypeError::InconsistentBinning(format!(
            "no bins at threshold {}",
            level.threshold
        )));
    }
    // Descending thresholds: counts must be non-decreasing along the sequence
    if let Some(pair) = levels.windows(2).find(|w| w[0].cluster_count > w[1].cluster_count) {
        return Err(EcotypeError::InconsistentBinning(format!(
            "{} bins at threshold {} but only {} at threshold {}",
            pair[0].cluster_count, pair[0].threshold, pair[1].cluster_count, pair[1].threshold
        )));
    }
    Ok(())
}

// ============================================================================
// Union-find
// ============================================================================
/// Pair of leaves (by position) and their divergence.
#[derive(Debug, Clone, Copy)]
struct Edge {
    left: usize,
    right: usize,
    divergence: f64,
}

/// Disjoint sets over `0..n` with path halving and union by size.
#[derive(Debug, Clone)]
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    count: usize,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            count: n,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
        self.count -= 1;
    }

    /// Number of disjoint sets.
    fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find_counts_components() {
        let mut sets = UnionFind::new(5);
        sets.union(0, 1);
        sets.union(1, 0);
        sets.union(3, 4);
        assert_eq!(sets.count(), 3);
        sets.union(4, 1);
        assert_eq!(sets.count(), 2);
        assert_eq!(sets.find(0), sets.find(3));
        assert_ne!(sets.find(2), sets.find(3));
    }

    #[test]
    fn test_verify_monotone_rejects_fragmenting_curve() {
        let levels = vec![BinLevel::new(0.2, 3), BinLevel::new(0.1, 2)];
        assert!(matches!(
            verify_monotone(&levels),
            Err(EcotypeError::InconsistentBinning(_))
        ));
    }
}

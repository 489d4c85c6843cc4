//! Two-segment curve fitting of the binning curve.
//!
//! On a plot of `log2(bins)` against the number of differing sites
//! (`threshold x sequence length`), the clustering curve typically consists
//! of a steep part, where periodic selection (sigma) purges diversity within
//! ecotypes, and a flat part, where the number of ecotypes (npop) is reached
//! and only rare genetic exchange between ecotypes (omega) matters.
//! [CurveEstimator] fits one line to each part and reads initial parameter
//! guesses off the two lines:
//! * `sigma = -slope(sigma line)`
//! * `omega = -slope(omega line)`
//! * `npop = round(2^y)` at the intersection of both lines
//!
//! The estimator is deterministic: the same levels always give the same fit.

use crate::binning::{collapse_plateaus, BinLevel};
use crate::error::EcotypeError;

// =#========================================================================#=
// POINT & LINE FIT
// =#========================================================================#=
/// A point of the transformed clustering curve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Number of differing sites at the bin threshold
    pub x: f64,
    /// `log2` of the number of bins
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A least-squares line `y = m x + b`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineFit {
    /// Slope
    pub m: f64,
    /// Intercept
    pub b: f64,
}

impl LineFit {
    /// Fits a least-squares line through `points`.
    ///
    /// Returns `None` for fewer than two points or if all points share one x.
    pub fn fit(points: &[Point]) -> Option<LineFit> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

        let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), p| {
            let dx = p.x - mean_x;
            (sxy + dx * (p.y - mean_y), sxx + dx * dx)
        });
        if sxx == 0.0 {
            return None;
        }

        let m = sxy / sxx;
        Some(LineFit { m, b: mean_y - m * mean_x })
    }

    /// Returns the y value of the line at `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.m * x + self.b
    }

    /// Returns the squared perpendicular distance of `point` to the line.
    pub fn squared_distance(&self, point: &Point) -> f64 {
        let residual = self.m * point.x - point.y + self.b;
        residual * residual / (self.m * self.m + 1.0)
    }

    /// Returns the point where both lines cross, or `None` for parallel lines.
    pub fn intersection(&self, other: &LineFit) -> Option<Point> {
        let dm = other.m - self.m;
        if dm == 0.0 || !dm.is_finite() {
            return None;
        }
        let x = (self.b - other.b) / dm;
        Some(Point::new(x, other.at(x)))
    }
}

// =#========================================================================#=
// PARAMETER ESTIMATE
// =#========================================================================#=
/// Initial guesses of the ecotype model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterEstimate {
    /// Number of ecotypes, at least 1
    pub npop: usize,
    /// Rate of genetic exchange between ecotypes, non-negative
    pub omega: f64,
    /// Rate of periodic selection within an ecotype, non-negative
    pub sigma: f64,
    /// Score assigned later by a likelihood computation, `None` until then
    pub likelihood: Option<f64>,
}

impl ParameterEstimate {
    /// Returns a copy of this estimate carrying the given likelihood.
    pub fn with_likelihood(self, likelihood: f64) -> Self {
        Self {
            likelihood: Some(likelihood),
            ..self
        }
    }
}

// =#========================================================================#=
// ESTIMATOR
// =#========================================================================#=
/// Configuration of the [CurveEstimator].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatorConfig {
    /// Maximum number of refinement rounds of the segment boundary.
    ///
    /// **Default**: `10`
    pub max_iterations: usize,

    /// Factor of `ln(number of sequences)` giving the squared distance below
    /// which a point may vote for moving the segment boundary.
    ///
    /// **Default**: `0.5`
    pub error_scale: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            error_scale: 0.5,
        }
    }
}

/// Result of fitting the clustering curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveFit {
    /// Parameter guesses, without likelihood
    pub estimate: ParameterEstimate,
    /// Line through the points up to and including the boundary
    pub sigma_line: LineFit,
    /// Line through the points from the boundary on
    pub omega_line: LineFit,
    /// Transformed points, x ascending
    pub points: Vec<Point>,
    /// Index of the point shared by both segments
    pub boundary: usize,
    /// Number of refinement rounds performed
    pub iterations: usize,
}

/// Fits two line segments to a clustering curve.
///
/// # Example
/// ```
/// use ecotype::binning::BinLevel;
/// use ecotype::estimate::CurveEstimator;
///
/// let levels: Vec<BinLevel> = [(0.20, 1), (0.10, 3), (0.05, 3), (0.01, 8)]
///     .into_iter()
///     .map(|(t, c)| BinLevel::new(t, c))
///     .collect();
///
/// let fit = CurveEstimator::new().estimate(&levels, 1000, 8).unwrap();
/// assert_eq!(fit.estimate.npop, 3);
/// assert!(fit.estimate.sigma > 0.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CurveEstimator {
    config: EstimatorConfig,
}

impl CurveEstimator {
    /// Creates an estimator with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: EstimatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Maps bin levels to curve points.
    ///
    /// Levels with a single bin are dropped and only the end points of each
    /// plateau of equal bin counts are kept. The remaining levels become
    /// `Point(threshold x sequence_length, log2(cluster_count))`, ordered by
    /// ascending x.
    ///
    /// Thresholds are divergences (fractions of differing sites), so x is
    /// the number of differing sites a cutoff allows. Formulations with
    /// identity cutoffs write the same axis as `(1 - identity) x length`.
    /// On this axis the bin count falls as x grows, which keeps sigma and
    /// omega non-negative.
    pub fn transform(levels: &[BinLevel], sequence_length: usize) -> Vec<Point> {
        let informative: Vec<BinLevel> = levels
            .iter()
            .filter(|level| level.cluster_count > 1)
            .copied()
            .collect();

        let mut points: Vec<Point> = collapse_plateaus(&informative)
            .iter()
            .map(|level| {
                Point::new(
                    level.threshold * sequence_length as f64,
                    (level.cluster_count as f64).log2(),
                )
            })
            .collect();
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
        points
    }

    /// Fits the two segments and derives a [ParameterEstimate].
    ///
    /// # Arguments
    /// * `levels` - Clustering curve, descending threshold
    /// * `sequence_length` - Number of analysed sites
    /// * `num_sequences` - Number of binned sequences, scales the vote threshold
    ///
    /// # Errors
    /// [EcotypeError::DegenerateFit] if fewer than three points remain, all
    /// points share one x, the fitted lines are parallel, or their
    /// intersection does not give at least one ecotype.
    /// [EcotypeError::InconsistentBinning] if a level has no bins or an
    /// invalid threshold.
    pub fn estimate(
        &self,
        levels: &[BinLevel],
        sequence_length: usize,
        num_sequences: usize,
    ) -> Result<CurveFit, EcotypeError> {
        if let Some(level) = levels
            .iter()
            .find(|l| l.cluster_count == 0 || !l.threshold.is_finite() || l.threshold < 0.0)
        {
            return Err(EcotypeError::InconsistentBinning(format!(
                "invalid bin level ({}, {})",
                level.threshold, level.cluster_count
            )));
        }

        let points = Self::transform(levels, sequence_length);
        let n = points.len();
        if n < 3 {
            return Err(EcotypeError::DegenerateFit(format!(
                "{n} informative bin levels, need at least 3 for two segments"
            )));
        }
        if points.iter().all(|p| p.x == points[0].x) {
            return Err(EcotypeError::DegenerateFit(
                "all bin levels map to the same number of differing sites".to_string(),
            ));
        }

        let vote_threshold = self.config.error_scale * (num_sequences.max(1) as f64).ln();
        let mut boundary = initial_boundary(&points);
        let mut best = (boundary, f64::INFINITY);
        let mut previous_error = f64::INFINITY;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;
            let (sigma_line, omega_line) = fit_segments(&points, boundary)?;

            let error = total_error(&points, boundary, &sigma_line, &omega_line);
            if error < best.1 {
                best = (boundary, error);
            }

            let prefers_sigma: Vec<bool> = points
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let to_sigma = sigma_line.squared_distance(p);
                    let to_omega = omega_line.squared_distance(p);
                    if to_sigma.min(to_omega) < vote_threshold {
                        to_sigma <= to_omega
                    } else {
                        i <= boundary
                    }
                })
                .collect();
            let next_boundary = best_boundary(&prefers_sigma, boundary);

            let converged = (previous_error - error).abs() < f64::EPSILON || next_boundary == boundary;
            if converged {
                break;
            }
            previous_error = error;
            boundary = next_boundary;
        }

        let boundary = best.0;
        let (sigma_line, omega_line) = fit_segments(&points, boundary)?;
        let estimate = extract_parameters(&sigma_line, &omega_line)?;

        Ok(CurveFit {
            estimate,
            sigma_line,
            omega_line,
            points,
            boundary,
            iterations,
        })
    }
}

/// Smallest and largest valid boundary for `n` points: both segments,
/// sharing the boundary point, need two points each.
fn boundary_range(n: usize) -> (usize, usize) {
    (1, n - 2)
}

/// Midpoint of the region in which `y` is changing, skipping flat runs at
/// both ends.
fn initial_boundary(points: &[Point]) -> usize {
    let n = points.len();
    let first_change = (0..n - 1).find(|&i| points[i].y != points[i + 1].y).unwrap_or(0);
    let last_change = (1..n)
        .rev()
        .find(|&i| points[i].y != points[i - 1].y)
        .unwrap_or(n - 1);

    let (lowest, highest) = boundary_range(n);
    ((first_change + last_change) / 2).clamp(lowest, highest)
}

fn fit_segments(points: &[Point], boundary: usize) -> Result<(LineFit, LineFit), EcotypeError> {
    let sigma_line = LineFit::fit(&points[..=boundary]);
    let omega_line = LineFit::fit(&points[boundary..]);
    match (sigma_line, omega_line) {
        (Some(sigma_line), Some(omega_line)) => Ok((sigma_line, omega_line)),
        _ => Err(EcotypeError::DegenerateFit(format!(
            "segment split at point {boundary} leaves a segment without x spread"
        ))),
    }
}

/// Sum of squared distances of each point to the line of its own segment.
fn total_error(points: &[Point], boundary: usize, sigma_line: &LineFit, omega_line: &LineFit) -> f64 {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i <= boundary {
                sigma_line.squared_distance(p)
            } else {
                omega_line.squared_distance(p)
            }
        })
        .sum()
}

/// Boundary disagreeing with the fewest votes; ties keep `current`, then
/// favour the earliest boundary.
fn best_boundary(prefers_sigma: &[bool], current: usize) -> usize {
    let (lowest, highest) = boundary_range(prefers_sigma.len());
    let disagreements = |candidate: usize| {
        prefers_sigma
            .iter()
            .enumerate()
            .filter(|&(i, &sigma)| (i <= candidate) != sigma)
            .count()
    };

    (lowest..=highest)
        .map(|candidate| (candidate, disagreements(candidate)))
        .fold((current, disagreements(current)), |best, candidate| {
            if candidate.1 < best.1 { candidate } else { best }
        })
        .0
}

fn extract_parameters(sigma_line: &LineFit, omega_line: &LineFit) -> Result<ParameterEstimate, EcotypeError> {
    let crossing = sigma_line.intersection(omega_line).ok_or_else(|| {
        EcotypeError::DegenerateFit(format!(
            "segments are parallel (slope {})",
            sigma_line.m
        ))
    })?;

    let npop = crossing.y.exp2().round();
    if !npop.is_finite() || npop < 1.0 {
        return Err(EcotypeError::DegenerateFit(format!(
            "segments cross at log2 bins {}, giving no ecotype",
            crossing.y
        )));
    }

    // Subtraction keeps a flat line at +0.0
    Ok(ParameterEstimate {
        npop: npop as usize,
        omega: 0.0 - omega_line.m,
        sigma: 0.0 - sigma_line.m,
        likelihood: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_fit_exact() {
        let points = [Point::new(0.0, 1.0), Point::new(1.0, 3.0), Point::new(2.0, 5.0)];
        let line = LineFit::fit(&points).unwrap();
        assert!((line.m - 2.0).abs() < 1e-12);
        assert!((line.b - 1.0).abs() < 1e-12);
        assert!(line.squared_distance(&points[1]) < 1e-20);
        assert!(LineFit::fit(&points[..1]).is_none());
        assert!(LineFit::fit(&[Point::new(1.0, 0.0), Point::new(1.0, 2.0)]).is_none());
    }

    #[test]
    fn test_perpendicular_distance() {
        let diagonal = LineFit { m: 1.0, b: 0.0 };
        let d = diagonal.squared_distance(&Point::new(0.0, 2.0));
        assert!((d - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_intersection() {
        let a = LineFit { m: -1.0, b: 4.0 };
        let b = LineFit { m: 0.0, b: 1.0 };
        assert_eq!(a.intersection(&b), Some(Point::new(3.0, 1.0)));
        assert_eq!(b.intersection(&b), None);
    }

    #[test]
    fn test_best_boundary_prefers_current_on_ties() {
        // Votes are split evenly between boundaries 1 and 3
        let votes = [true, true, false, true, false, false];
        assert_eq!(best_boundary(&votes, 3), 3);
        assert_eq!(best_boundary(&votes, 1), 1);
        let votes = [true, true, true, true, false, false];
        assert_eq!(best_boundary(&votes, 1), 3);
    }

    #[test]
    fn test_initial_boundary_skips_flat_ends() {
        let points: Vec<Point> = [5.0, 5.0, 4.0, 3.0, 2.0, 2.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &y)| Point::new(i as f64, y))
            .collect();
        // Changes between 1 and 4
        assert_eq!(initial_boundary(&points), 2);
    }
}

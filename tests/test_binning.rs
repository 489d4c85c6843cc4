use ecotype::EcotypeError;
use ecotype::alignment::Alignment;
use ecotype::binning::{BinLevel, Binning, BinningConfig, DEFAULT_THRESHOLDS, collapse_plateaus};
use ecotype::divergence::{DivergenceMatrix, DivergenceSource, PatristicDivergence};
use ecotype::newick::parse_str;

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn counts(levels: &[BinLevel]) -> Vec<usize> {
    levels.iter().map(|level| level.cluster_count).collect()
}

fn with_thresholds<D: DivergenceSource>(source: D, thresholds: &[f64]) -> Binning<D> {
    Binning::new(source).with_config(BinningConfig {
        thresholds: thresholds.to_vec(),
    })
}

/// Divergence source backed by a closure, for data a matrix cannot hold.
struct FnSource<F: Fn(&str, &str) -> Option<f64>>(F);

impl<F: Fn(&str, &str) -> Option<f64>> DivergenceSource for FnSource<F> {
    fn divergence(&self, a: &str, b: &str) -> Option<f64> {
        (self.0)(a, b)
    }
}

#[test]
fn test_single_linkage_chains() {
    // A-B and B-C are close, A-C is not: single linkage still joins all three
    let leaves = names(&["A", "B", "C", "D"]);
    let matrix = DivergenceMatrix::new(
        leaves.clone(),
        vec![vec![], vec![0.02], vec![0.2, 0.03], vec![0.4, 0.4, 0.4]],
    )
    .unwrap();

    let levels = with_thresholds(&matrix, &[0.5, 0.1, 0.025, 0.01])
        .compute_bin_levels(&leaves)
        .unwrap();
    let thresholds: Vec<f64> = levels.iter().map(|level| level.threshold).collect();
    assert_eq!(thresholds, vec![0.5, 0.1, 0.025, 0.01]);
    assert_eq!(counts(&levels), vec![1, 2, 3, 4]);
}

#[test]
fn test_threshold_includes_equal_divergence() {
    let leaves = names(&["A", "B"]);
    let matrix = DivergenceMatrix::new(leaves.clone(), vec![vec![], vec![0.05]]).unwrap();
    let levels = with_thresholds(&matrix, &[0.05, 0.04])
        .compute_bin_levels(&leaves)
        .unwrap();
    assert_eq!(counts(&levels), vec![1, 2]);
}

#[test]
fn test_monotone_on_tree_divergence() {
    let tree = parse_str(
        "(((A:0.001,B:0.002):0.01,(C:0.003,D:0.004):0.02):0.05,((E:0.005,F:0.006):0.03,G:0.04):0.06);",
    )
    .unwrap();
    let leaves = tree.leaf_names();
    let levels = Binning::new(PatristicDivergence::new(&tree))
        .compute_bin_levels(&leaves)
        .unwrap();

    assert_eq!(levels.len(), DEFAULT_THRESHOLDS.len());
    for pair in levels.windows(2) {
        assert!(pair[0].threshold > pair[1].threshold);
        assert!(pair[0].cluster_count <= pair[1].cluster_count);
    }
    assert_eq!(levels.first().unwrap().cluster_count, 1);
    assert_eq!(levels.last().unwrap().cluster_count, 7);
}

#[test]
fn test_subset_of_leaves() {
    let tree = parse_str("((A:0.01,B:0.01):0.2,(C:0.01,D:0.01):0.2);").unwrap();
    let binning = with_thresholds(PatristicDivergence::new(&tree), &[0.5, 0.1, 0.0]);
    let levels = binning.compute_bin_levels(&names(&["A", "B", "C"])).unwrap();
    assert_eq!(counts(&levels), vec![1, 2, 3]);
}

#[test]
fn test_alignment_divergence() {
    let alignment = Alignment::from_fasta_str(
        ">a\nAAAAAAAAAA\n>b\nAAAAAAAAAC\n>c\nCCAAAAAAAA\n>d\nCCAAAAAAAC\n",
    )
    .unwrap();
    let matrix = DivergenceMatrix::from_alignment(&alignment);
    let levels = with_thresholds(&matrix, &[0.3, 0.15, 0.1, 0.0])
        .compute_bin_levels(alignment.identifiers())
        .unwrap();
    assert_eq!(counts(&levels), vec![1, 2, 2, 4]);

    let levels = with_thresholds(&matrix, &[0.05])
        .compute_bin_levels(alignment.identifiers())
        .unwrap();
    assert_eq!(counts(&levels), vec![4]);
}

#[test]
fn test_single_leaf() {
    let leaves = names(&["A"]);
    let matrix = DivergenceMatrix::new(leaves.clone(), vec![vec![]]).unwrap();
    let levels = Binning::new(&matrix).compute_bin_levels(&leaves).unwrap();
    assert_eq!(levels, vec![BinLevel::new(0.5, 1)]);
}

#[test]
fn test_empty_leaf_set() {
    let matrix = DivergenceMatrix::new(Vec::new(), Vec::new()).unwrap();
    let result = Binning::new(&matrix).compute_bin_levels(&[]);
    assert!(matches!(result, Err(EcotypeError::InconsistentBinning(_))));
}

#[test]
fn test_missing_divergence() {
    let leaves = names(&["A", "B"]);
    let matrix = DivergenceMatrix::new(leaves, vec![vec![], vec![0.1]]).unwrap();
    let result = Binning::new(&matrix).compute_bin_levels(&names(&["A", "Z"]));
    assert!(matches!(result, Err(EcotypeError::InconsistentBinning(_))));
}

#[test]
fn test_invalid_divergence_values() {
    for value in [f64::NAN, f64::INFINITY, -0.1] {
        let leaves = names(&["A", "B", "C"]);
        let matrix =
            DivergenceMatrix::new(leaves.clone(), vec![vec![], vec![0.1], vec![0.2, value]]).unwrap();
        let result = Binning::new(&matrix).compute_bin_levels(&leaves);
        assert!(
            matches!(result, Err(EcotypeError::InconsistentBinning(_))),
            "divergence {value} should be rejected"
        );
    }
}

#[test]
fn test_asymmetric_divergence() {
    let leaves = names(&["A", "B"]);
    let matrix =
        DivergenceMatrix::new(leaves.clone(), vec![vec![0.0, 0.1], vec![0.2, 0.0]]).unwrap();
    let result = Binning::new(&matrix).compute_bin_levels(&leaves);
    assert!(matches!(result, Err(EcotypeError::InconsistentBinning(_))));

    // Asymmetry below tolerance is accepted
    let source = FnSource(|a: &str, b: &str| Some(if a < b { 0.1 } else { 0.1 + 1e-12 }));
    assert!(Binning::new(source).compute_bin_levels(&leaves).is_ok());
}

#[test]
fn test_invalid_thresholds() {
    let leaves = names(&["A", "B"]);
    let matrix = DivergenceMatrix::new(leaves.clone(), vec![vec![], vec![0.1]]).unwrap();
    for thresholds in [vec![], vec![0.1, 1.5], vec![-0.1], vec![f64::NAN]] {
        let result = with_thresholds(&matrix, &thresholds).compute_bin_levels(&leaves);
        assert!(matches!(result, Err(EcotypeError::InconsistentBinning(_))));
    }
}

#[test]
fn test_collapse_plateaus() {
    let levels: Vec<BinLevel> = [(0.5, 1), (0.4, 1), (0.3, 1), (0.2, 3), (0.1, 5), (0.05, 5), (0.01, 5), (0.0, 9)]
        .into_iter()
        .map(|(t, c)| BinLevel::new(t, c))
        .collect();
    let collapsed = collapse_plateaus(&levels);
    let thresholds: Vec<f64> = collapsed.iter().map(|level| level.threshold).collect();
    assert_eq!(thresholds, vec![0.5, 0.3, 0.2, 0.1, 0.01, 0.0]);

    assert!(collapse_plateaus(&[]).is_empty());
    let single = [BinLevel::new(0.1, 2)];
    assert_eq!(collapse_plateaus(&single), single.to_vec());
}

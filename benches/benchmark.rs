use criterion::{Criterion, criterion_group, criterion_main};
use ecotype::binning::Binning;
use ecotype::divergence::PatristicDivergence;
use ecotype::estimate::CurveEstimator;
use ecotype::model::Tree;
use ecotype::newick;
use std::hint::black_box;

/// Balanced tree with `2^depth` leaves and branch lengths shrinking towards the tips.
fn balanced_newick(depth: u32) -> String {
    fn subtree(depth: u32, next_leaf: &mut usize, newick: &mut String) {
        if depth == 0 {
            newick.push_str(&format!("L{}", *next_leaf));
            *next_leaf += 1;
        } else {
            newick.push('(');
            subtree(depth - 1, next_leaf, newick);
            newick.push(',');
            subtree(depth - 1, next_leaf, newick);
            newick.push(')');
        }
        newick.push_str(&format!(":{}", 0.002 * f64::from(depth + 1)));
    }

    let mut newick = String::new();
    let mut next_leaf = 0;
    subtree(depth, &mut next_leaf, &mut newick);
    newick.push(';');
    newick
}

fn parse_tree(c: &mut Criterion) {
    let input = balanced_newick(9);
    c.bench_function("parse_512", |b| {
        b.iter(|| newick::parse_str(black_box(&input)).unwrap());
    });
}

fn sort_tree(c: &mut Criterion) {
    let tree = newick::parse_str(balanced_newick(9)).unwrap();
    c.bench_function("sort_512", |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree: Tree| tree.sort_children(),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bin_and_estimate(c: &mut Criterion) {
    let tree = newick::parse_str(balanced_newick(7)).unwrap();
    let leaves = tree.leaf_names();
    let binning = Binning::new(PatristicDivergence::new(&tree));

    c.bench_function("binning_128", |b| {
        b.iter(|| binning.compute_bin_levels(black_box(&leaves)).unwrap());
    });

    let levels = binning.compute_bin_levels(&leaves).unwrap();
    let estimator = CurveEstimator::new();
    c.bench_function("estimate_128", |b| {
        b.iter(|| estimator.estimate(black_box(&levels), 1000, leaves.len()));
    });
}

criterion_group!(regression, parse_tree, sort_tree);
criterion_group! {
    name = analysis;
    config = Criterion::default().sample_size(20);
    targets = bin_and_estimate
}
criterion_main!(regression, analysis);

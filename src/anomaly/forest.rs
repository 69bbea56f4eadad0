//! Seeded isolation forest for scoring residuals.
//!
//! Scores are in [0, 1]: values that isolate in few random splits score
//! close to 1, values buried in the bulk of the distribution score near or
//! below 0.5. The forest is always seeded so identical inputs produce
//! identical scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

enum Node {
    Leaf { size: usize },
    Split { at: f64, left: Box<Node>, right: Box<Node> },
}

/// Average unsuccessful-search path length in a binary search tree of
/// `n` nodes; the standard isolation-forest normalizer.
fn average_path_length(n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let n = n as f64;
    let harmonic = (n - 1.0).ln() + 0.577_215_664_901_532_9;
    2.0 * harmonic - 2.0 * (n - 1.0) / n
}

fn build_tree(values: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    let (min, max) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });

    if values.len() <= 1 || depth >= max_depth || max <= min {
        return Node::Leaf { size: values.len() };
    }

    let at = rng.gen_range(min..max);
    let cut = partition_in_place(values, at);
    let (left_vals, right_vals) = values.split_at_mut(cut);

    Node::Split {
        at,
        left: Box::new(build_tree(left_vals, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(right_vals, depth + 1, max_depth, rng)),
    }
}

/// Partition `values` so everything `< at` precedes the rest; returns the
/// boundary index.
fn partition_in_place(values: &mut [f64], at: f64) -> usize {
    let mut cut = 0;
    for i in 0..values.len() {
        if values[i] < at {
            values.swap(i, cut);
            cut += 1;
        }
    }
    cut
}

fn path_length(node: &Node, value: f64, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split { at, left, right } => {
            if value < *at {
                path_length(left, value, depth + 1)
            } else {
                path_length(right, value, depth + 1)
            }
        }
    }
}

/// Score each value with an isolation forest over the value distribution.
///
/// `sample_size` caps the per-tree subsample (drawn without replacement);
/// `seed` fixes the forest so scoring is deterministic.
pub(crate) fn isolation_scores(
    values: &[f64],
    n_trees: usize,
    sample_size: usize,
    seed: u64,
) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let sample_size = sample_size.min(n);
    // ceil(log2(sample_size)): past this depth everything looks normal.
    let max_depth = ((sample_size as f64).log2().ceil() as usize).max(1);
    let mut rng = StdRng::seed_from_u64(seed);

    let trees: Vec<Node> = (0..n_trees)
        .map(|_| {
            let mut sample: Vec<f64> = if sample_size == n {
                values.to_vec()
            } else {
                rand::seq::index::sample(&mut rng, n, sample_size)
                    .into_iter()
                    .map(|i| values[i])
                    .collect()
            };
            build_tree(&mut sample, 0, max_depth, &mut rng)
        })
        .collect();

    let normalizer = average_path_length(sample_size).max(f64::MIN_POSITIVE);

    values
        .iter()
        .map(|&v| {
            let mean_path: f64 = trees
                .iter()
                .map(|tree| path_length(tree, v, 0))
                .sum::<f64>()
                / n_trees as f64;
            2.0_f64.powf(-mean_path / normalizer)
        })
        .collect()
}

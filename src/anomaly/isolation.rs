// Logwarden - GPL-3.0-or-later

//! Isolation forest, the always-available structural outlier model.
//!
//! Points that are easy to separate from the rest of the baseline by random
//! axis-aligned cuts end up close to the root of each tree; the average path
//! length over the forest is turned into a score in the usual
//! `2^(-E[h(x)] / c(psi))` form.

use crate::anomaly::model::{ModelKind, ScoreModel};
use crate::config::ForestParams;
use crate::error::{EngineError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Offset between the raw isolation score and the decision value, matching
/// the usual "auto" contamination setting
const DECISION_OFFSET: f64 = 0.5;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
        /// Set when the node could not be split because every sample in it
        /// was identical; holds that shared point.
        constant: Option<FeatureVector>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(samples: &[FeatureVector], height_limit: usize, rng: &mut ChaCha8Rng) -> Self {
        Self {
            root: build_node(samples, 0, height_limit, rng),
        }
    }

    /// Depth at which `point` is isolated, including the expected remaining
    /// depth for unsplit leaves
    #[must_use]
    pub fn path_length(&self, point: &FeatureVector) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;

        loop {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point.0[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1.0;
                }
                Node::Leaf { size, constant } => {
                    let remaining = average_path_length(*size);
                    // The more axes separate the point from the leaf's shared
                    // value, the sooner a random cut isolates it.
                    let shared_fraction = constant
                        .as_ref()
                        .map_or(1.0, |shared| 1.0 - differing_fraction(shared, point));
                    return depth + remaining * shared_fraction;
                }
            }
        }
    }
}

fn build_node(
    samples: &[FeatureVector],
    depth: usize,
    height_limit: usize,
    rng: &mut ChaCha8Rng,
) -> Node {
    let size = samples.len();
    if size <= 1 || depth >= height_limit {
        return Node::Leaf {
            size,
            constant: None,
        };
    }

    // Per-feature range within this node; only non-constant features can split
    let mut splittable: Vec<(usize, f64, f64)> = Vec::with_capacity(FEATURE_COUNT);
    for feature in 0..FEATURE_COUNT {
        let (min, max) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.0[feature]), hi.max(s.0[feature]))
        });
        if max > min {
            splittable.push((feature, min, max));
        }
    }

    if splittable.is_empty() {
        return Node::Leaf {
            size,
            constant: Some(samples[0]),
        };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(min..max);

    let (left, right): (Vec<FeatureVector>, Vec<FeatureVector>) =
        samples.iter().partition(|s| s.0[feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_node(&left, depth + 1, height_limit, rng)),
        right: Box::new(build_node(&right, depth + 1, height_limit, rng)),
    }
}

/// Share of features in which `a` and `b` disagree, in [0, 1]
fn differing_fraction(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let differing = a.0.iter().zip(&b.0).filter(|(x, y)| x != y).count();
    differing as f64 / FEATURE_COUNT as f64
}

/// Average path length of an unsuccessful BST search over `n` points, c(n)
#[must_use]
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Seeded isolation forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
}

impl IsolationForest {
    /// Fit on the baseline rows.
    ///
    /// Trees are grown one after another from a single seeded stream, so the
    /// same rows and params always produce the same forest.
    pub fn fit(rows: &[FeatureVector], params: &ForestParams) -> Result<Self> {
        if rows.is_empty() {
            return Err(EngineError::EmptyTrainingSet);
        }

        let subsample_size = params.max_samples.clamp(1, rows.len());
        let height_limit = (subsample_size.max(2) as f64).log2().ceil() as usize;
        let n_trees = params.n_trees.max(1);
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

        let start = std::time::Instant::now();
        let trees = (0..n_trees)
            .map(|_| {
                let sample: Vec<FeatureVector> = index::sample(&mut rng, rows.len(), subsample_size)
                    .into_iter()
                    .map(|i| rows[i])
                    .collect();
                IsolationTree::build(&sample, height_limit, &mut rng)
            })
            .collect();

        tracing::debug!(
            "Fitted isolation forest: {n_trees} trees, subsample {subsample_size}, height limit {height_limit} in {:?}",
            start.elapsed()
        );

        Ok(Self {
            trees,
            subsample_size,
        })
    }

    /// Raw isolation score in (0, 1]; around 0.5 or below is ordinary
    #[must_use]
    pub fn isolation_score(&self, point: &FeatureVector) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(point))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = average_path_length(self.subsample_size).max(1.0);
        2f64.powf(-mean_path / normalizer)
    }

    /// Native decision value: positive for inliers, negative for outliers
    #[must_use]
    pub fn decision_function(&self, point: &FeatureVector) -> f64 {
        DECISION_OFFSET - self.isolation_score(point)
    }
}

impl ScoreModel for IsolationForest {
    fn kind(&self) -> ModelKind {
        ModelKind::Structural
    }

    fn score(&self, rows: &[FeatureVector]) -> Vec<f64> {
        // Decision values fall as anomalies rise, so flip the sign
        rows.par_iter()
            .map(|row| -self.decision_function(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn row(values: [f64; FEATURE_COUNT]) -> FeatureVector {
        FeatureVector(values)
    }

    fn normal_rows(n: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| {
                let jitter = (i % 7) as f64;
                row([0.0, 200.0, 1000.0 + jitter * 10.0, 11.0 + jitter, 0.0, 3.2, 4.1, 0.0])
            })
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!(c256 > 10.0 && c256 < 11.0, "c(256) = {c256}");
    }

    #[test]
    fn test_empty_training_set() {
        let result = IsolationForest::fit(&[], &ForestParams::default());
        assert!(matches!(result, Err(EngineError::EmptyTrainingSet)));
    }

    #[test]
    fn test_outlier_scores_higher() {
        let forest = IsolationForest::fit(&normal_rows(100), &ForestParams::default())
            .expect("fit");
        let inlier = row([0.0, 200.0, 1030.0, 14.0, 0.0, 3.2, 4.1, 0.0]);
        let outlier = row([1.0, 500.0, 99.0, 80.0, 40.0, 5.5, 2.0, 1.0]);
        let scores = forest.score(&[inlier, outlier]);
        assert!(scores[1] > scores[0], "{scores:?}");
        assert!(forest.decision_function(&outlier) < forest.decision_function(&inlier));
    }

    #[test]
    fn test_constant_baseline_isolates_new_points() {
        let rows = vec![row([0.0, 200.0, 512.0, 11.0, 0.0, 3.0, 4.0, 0.0]); 50];
        let forest = IsolationForest::fit(&rows, &ForestParams::default()).expect("fit");
        let same = rows[0];
        let different = row([0.0, 200.0, 512.0, 40.0, 20.0, 4.5, 4.0, 1.0]);

        let scores = forest.score(&[same, different]);
        // Seen point sits at the expected depth of the whole subsample
        assert!(scores[0].abs() < 1e-12, "{scores:?}");
        assert!(scores[1] > scores[0]);
    }

    #[test]
    fn test_constant_baseline_grades_by_distance() {
        let seen = row([0.0, 200.0, 1024.0, 11.0, 0.0, 3.0, 4.0, 0.0]);
        let forest = IsolationForest::fit(&[seen; 50], &ForestParams::default()).expect("fit");

        // One byte more in the response, nothing else changes
        let size_variant = row([0.0, 200.0, 1025.0, 11.0, 0.0, 3.0, 4.0, 0.0]);
        let injection = row([0.0, 200.0, 87.0, 60.0, 45.0, 4.6, 4.0, 1.0]);

        let scores = forest.score(&[seen, size_variant, injection]);
        assert!(scores[0].abs() < 1e-12, "{scores:?}");
        assert!(scores[1] > scores[0], "{scores:?}");
        assert!(scores[2] > scores[1], "{scores:?}");
    }

    #[test]
    fn test_fit_is_reproducible() {
        let rows = normal_rows(60);
        let params = ForestParams {
            n_trees: 50,
            ..ForestParams::default()
        };
        let a = IsolationForest::fit(&rows, &params).expect("fit");
        let b = IsolationForest::fit(&rows, &params).expect("fit");

        let points = [rows[3], row([3.0, 404.0, 0.0, 30.0, 12.0, 4.0, 1.0, 1.0])];
        let sa = a.score(&points);
        let sb = b.score(&points);
        for (x, y) in sa.iter().zip(sb.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_single_training_row() {
        let rows = vec![row([0.0; FEATURE_COUNT])];
        let forest = IsolationForest::fit(&rows, &ForestParams::default()).expect("fit");
        let scores = forest.score(&[rows[0], row([1.0; FEATURE_COUNT])]);
        assert!(scores.iter().all(|s| s.is_finite()));
    }
}

//! Isolation forest over a single numeric feature.
//!
//! Each tree recursively splits a random subsample at uniformly drawn
//! thresholds. Values that end up isolated after few splits get short
//! path lengths and therefore low (more anomalous) scores.

use super::OutlierDetector;
use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum number of samples needed to fit a forest.
pub const MIN_SAMPLES: usize = 2;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation forest settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    /// Expected fraction of anomalous samples, in `(0, 0.5]`.
    pub contamination: f64,
    /// Seed for the ensemble's random generator.
    pub seed: u64,
    /// Number of trees.
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the number of samples.
    pub max_samples: usize,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            seed: 42,
            n_estimators: 100,
            max_samples: 256,
        }
    }
}

impl IsolationForestParams {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(invalid("contamination", "must be in (0, 0.5]"));
        }
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1"));
        }
        if self.max_samples < MIN_SAMPLES {
            return Err(invalid("max_samples", "must be at least 2"));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// A single isolation tree stored as a flat node arena. Node 0 is the root.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(values: &mut [f64], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        grow(values, 0, height_limit, rng, &mut nodes);
        Self { nodes }
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = 0;
        let mut depth = 0usize;
        loop {
            match self.nodes[node] {
                Node::Split {
                    threshold,
                    left,
                    right,
                } => {
                    node = if x <= threshold { left } else { right };
                    depth += 1;
                }
                Node::Leaf { size } => return depth as f64 + average_path_length(size),
            }
        }
    }
}

fn grow(
    values: &mut [f64],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
    nodes: &mut Vec<Node>,
) -> usize {
    let id = nodes.len();
    let (min, max) = bounds(values);

    if depth >= height_limit || values.len() <= 1 || min >= max {
        nodes.push(Node::Leaf { size: values.len() });
        return id;
    }

    let threshold = rng.gen_range(min..max);
    // Placeholder until both children are known.
    nodes.push(Node::Leaf { size: 0 });

    let mut split = 0;
    for i in 0..values.len() {
        if values[i] <= threshold {
            values.swap(i, split);
            split += 1;
        }
    }

    let (lower, upper) = values.split_at_mut(split);
    let left = grow(lower, depth + 1, height_limit, rng, nodes);
    let right = grow(upper, depth + 1, height_limit, rng, nodes);
    nodes[id] = Node::Split {
        threshold,
        left,
        right,
    };
    id
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Average path length of an unsuccessful search in a binary search tree of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Percentile with linear interpolation between closest ranks. `q` is in `[0, 100]`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Isolation forest detector.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    params: IsolationForestParams,
    trees: Vec<IsolationTree>,
    subsample_size: usize,
    offset: f64,
    fitted: bool,
}

impl IsolationForest {
    /// Create an unfitted forest with the given parameters.
    pub fn new(params: IsolationForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            subsample_size: 0,
            offset: 0.0,
            fitted: false,
        }
    }

    /// Decision threshold on raw scores, available after fitting.
    pub fn offset(&self) -> Option<f64> {
        self.fitted.then_some(self.offset)
    }

    fn ensure_fitted(&self) -> Result<()> {
        if self.fitted {
            Ok(())
        } else {
            Err(PipelineError::NotFitted)
        }
    }

    fn raw_scores(&self, data: &[f64]) -> Vec<f64> {
        let normalizer = average_path_length(self.subsample_size);
        let n_trees = self.trees.len() as f64;

        data.iter()
            .map(|&x| {
                let mean_depth =
                    self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / n_trees;
                -(2f64.powf(-mean_depth / normalizer))
            })
            .collect()
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(IsolationForestParams::default())
    }
}

impl OutlierDetector for IsolationForest {
    fn fit(&mut self, data: &[f64]) -> Result<()> {
        self.params.validate()?;
        if data.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if data.len() < MIN_SAMPLES {
            return Err(PipelineError::InsufficientData {
                required: MIN_SAMPLES,
                got: data.len(),
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(invalid("data", "values must be finite"));
        }
        // Thresholds are drawn from [min, max); the span itself must be representable.
        let (min, max) = bounds(data);
        if !(max - min).is_finite() {
            return Err(invalid("data", "value range exceeds the f64 range"));
        }

        let n = data.len();
        let subsample_size = self.params.max_samples.min(n);
        let height_limit = (subsample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        self.trees = (0..self.params.n_estimators)
            .map(|_| {
                let mut sample: Vec<f64> = index::sample(&mut rng, n, subsample_size)
                    .into_iter()
                    .map(|i| data[i])
                    .collect();
                IsolationTree::build(&mut sample, height_limit, &mut rng)
            })
            .collect();
        self.subsample_size = subsample_size;

        let scores = self.raw_scores(data);
        self.offset = percentile(&scores, 100.0 * self.params.contamination);
        self.fitted = true;

        debug!(
            "Fitted isolation forest: {} trees, subsample {}, height limit {}, offset {:.6}",
            self.trees.len(),
            subsample_size,
            height_limit,
            self.offset
        );
        Ok(())
    }

    fn score_samples(&self, data: &[f64]) -> Result<Vec<f64>> {
        self.ensure_fitted()?;
        Ok(self.raw_scores(data))
    }

    fn decision_function(&self, data: &[f64]) -> Result<Vec<f64>> {
        self.ensure_fitted()?;
        Ok(self
            .raw_scores(data)
            .into_iter()
            .map(|s| s - self.offset)
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Prediction;

    fn synthetic(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(900.0..1100.0)).collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2 * (ln 255 + gamma) - 2 * 255 / 256
        let expected = 2.0 * (255f64.ln() + EULER_GAMMA) - 2.0 * 255.0 / 256.0;
        assert!((average_path_length(256) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&[7.0, 7.0, 7.0], 10.0), 7.0);
    }

    #[test]
    fn test_invalid_params() {
        let mut params = IsolationForestParams::default();
        params.contamination = 0.0;
        assert!(params.validate().is_err());
        params.contamination = 0.6;
        assert!(params.validate().is_err());

        let mut params = IsolationForestParams::default();
        params.n_estimators = 0;
        assert!(params.validate().is_err());

        let mut params = IsolationForestParams::default();
        params.max_samples = 1;
        assert!(params.validate().is_err());

        assert!(IsolationForestParams::default().validate().is_ok());
    }

    #[test]
    fn test_fit_rejects_small_inputs() {
        let mut forest = IsolationForest::default();
        assert!(matches!(forest.fit(&[]), Err(PipelineError::EmptyInput)));
        assert!(matches!(
            forest.fit(&[1.0]),
            Err(PipelineError::InsufficientData {
                required: 2,
                got: 1
            })
        ));
        assert!(!forest.is_fitted());
    }

    #[test]
    fn test_fit_rejects_overflowing_range() {
        let mut forest = IsolationForest::default();
        let err = forest.fit(&[-1e308, 0.0, 1e308]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { ref name, .. } if name == "data"));
        assert!(!forest.is_fitted());

        // Large but representable spans still fit.
        assert!(forest.fit(&[-1e307, 0.0, 1e307]).is_ok());
    }

    #[test]
    fn test_unfitted_scoring_fails() {
        let forest = IsolationForest::default();
        assert!(matches!(
            forest.score_samples(&[1.0, 2.0]),
            Err(PipelineError::NotFitted)
        ));
        assert!(forest.offset().is_none());
    }

    #[test]
    fn test_scores_bounded() {
        let data = synthetic(64, 7);
        let mut forest = IsolationForest::default();
        forest.fit(&data).unwrap();

        for score in forest.score_samples(&data).unwrap() {
            assert!((-1.0..=0.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn test_extreme_value_is_outlier() {
        let mut data = synthetic(50, 3);
        data.push(1_000_000.0);

        let mut forest = IsolationForest::default();
        let predictions = forest.fit_predict(&data).unwrap();

        assert_eq!(predictions[50], Prediction::Outlier);
        let scores = forest.score_samples(&data).unwrap();
        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(scores[50], min);
    }

    #[test]
    fn test_identical_values_are_inliers() {
        let data = vec![42.0; 10];
        let mut forest = IsolationForest::default();
        let predictions = forest.fit_predict(&data).unwrap();
        assert!(predictions.iter().all(|p| *p == Prediction::Inlier));
    }

    #[test]
    fn test_contamination_fraction() {
        let data = synthetic(400, 11);
        let mut forest = IsolationForest::default();
        let predictions = forest.fit_predict(&data).unwrap();

        let outliers = predictions
            .iter()
            .filter(|p| **p == Prediction::Outlier)
            .count();
        let fraction = outliers as f64 / data.len() as f64;
        assert!((fraction - 0.1).abs() <= 0.05, "fraction was {fraction}");
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let data = synthetic(120, 5);

        let mut a = IsolationForest::default();
        let mut b = IsolationForest::default();
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();

        assert_eq!(a.score_samples(&data).unwrap(), b.score_samples(&data).unwrap());
        assert_eq!(a.offset(), b.offset());
    }

    #[test]
    fn test_subsample_capped_at_sample_count() {
        let data = synthetic(20, 9);
        let mut forest = IsolationForest::default();
        forest.fit(&data).unwrap();
        assert_eq!(forest.subsample_size, 20);
        assert_eq!(forest.trees.len(), 100);
    }
}

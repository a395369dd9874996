//! Unsupervised outlier detection.
//!
//! Detectors are fitted on a single numeric feature and turn each value
//! into a two-variant [`Prediction`].

pub mod iforest;

pub use iforest::{IsolationForest, IsolationForestParams, MIN_SAMPLES};

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Binary outcome of a detector for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prediction {
    Outlier,
    Inlier,
}

impl Prediction {
    /// Maps a decision value to a prediction. Strictly negative values are outliers.
    pub fn from_decision(decision: f64) -> Self {
        if decision < 0.0 {
            Prediction::Outlier
        } else {
            Prediction::Inlier
        }
    }
}

/// Outlier detector over a one-dimensional feature.
pub trait OutlierDetector {
    /// Fit the detector to training data.
    fn fit(&mut self, data: &[f64]) -> Result<()>;

    /// Raw anomaly scores; lower is more anomalous.
    fn score_samples(&self, data: &[f64]) -> Result<Vec<f64>>;

    /// Scores shifted by the fitted threshold; negative means outlier.
    fn decision_function(&self, data: &[f64]) -> Result<Vec<f64>>;

    /// Check if detector has been fitted.
    fn is_fitted(&self) -> bool;

    /// Predict a label for every sample.
    fn predict(&self, data: &[f64]) -> Result<Vec<Prediction>> {
        Ok(self
            .decision_function(data)?
            .into_iter()
            .map(Prediction::from_decision)
            .collect())
    }

    /// Fit on `data`, then predict the same samples.
    fn fit_predict(&mut self, data: &[f64]) -> Result<Vec<Prediction>> {
        self.fit(data)?;
        self.predict(data)
    }
}

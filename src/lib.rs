//! # Survey Isolation Forest
//!
//! Unsupervised anomaly scoring for batches of geolocated survey records,
//! using an ensemble of randomized isolation trees as described in
//! [Isolation Forest](https://doi.org/10.1109/ICDM.2008.17) (Liu, Ting and
//! Zhou, 2008). Records that are easy to isolate by random axis-aligned
//! splits receive scores near 1; records deep inside a dense cluster score
//! well below 0.5.
//!
//! The crate covers feature preparation (numeric extraction and median
//! imputation), training, scoring and versioned model storage. It performs
//! no I/O: ingestion, presentation and any remote scoring fallback are the
//! caller's concern.
//!
//! ## Example
//!
//! ```rust
//! use survey_isolation_forest::features::{
//!     compute_medians, extract_numeric_features, impute_with_medians, SURVEY_FEATURES,
//! };
//! use survey_isolation_forest::{Forest, ForestOptions, DEFAULT_ANOMALY_THRESHOLD};
//!
//! // Records arrive as loosely-typed field/value maps; numbers may be
//! // encoded as text and fields may be missing entirely.
//! let records: Vec<serde_json::Map<String, serde_json::Value>> = (0..200)
//!     .map(|i| {
//!         let jitter = (i % 10) as f64 * 0.01;
//!         serde_json::json!({
//!             "latitude": 20.0 + jitter,
//!             "longitude": 70.0 - jitter,
//!             "quantity": 12,
//!             "weight_kg": format!("{:.2}", 3.5 + jitter),
//!             "depth_m": 40,
//!             // water_temperature intentionally missing; imputed below
//!         })
//!         .as_object()
//!         .cloned()
//!         .unwrap()
//!     })
//!     .collect();
//!
//! let raw = extract_numeric_features(&records, &SURVEY_FEATURES);
//! let matrix = impute_with_medians(&raw, &compute_medians(&raw));
//!
//! let forest = Forest::fit(&matrix, &SURVEY_FEATURES, &ForestOptions::default()).unwrap();
//! let prediction = forest.predict(&matrix[0], DEFAULT_ANOMALY_THRESHOLD);
//! assert!(prediction.score > 0.0 && prediction.score <= 1.0);
//! assert_eq!(prediction.is_anomaly, prediction.score >= DEFAULT_ANOMALY_THRESHOLD);
//! ```

use log::debug;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use crate::error::Error;
pub use crate::features::{FeatureMatrix, FeatureVector};
pub use crate::model::{StoredModel, MODEL_FORMAT_VERSION};
use crate::tree::{c_factor, Tree};

mod error;
pub mod features;
mod model;
mod tree;

/// Default calibration point for [`Forest::predict`]. A tunable, not a
/// derived statistical cutoff.
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct ForestOptions {
    /// Number of trees in the ensemble.
    pub tree_count: usize,

    /// Rows sampled without replacement for each tree. Capped at the row
    /// count of the training matrix.
    pub sample_size: usize,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            tree_count: 100,
            sample_size: 256,
        }
    }
}

/// Result of scoring one vector against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Anomaly score in (0, 1]; 0.0 only for an empty ensemble.
    pub score: f64,
    /// Whether the score reached the caller's threshold.
    pub is_anomaly: bool,
}

/// A fitted ensemble of isolation trees.
///
/// Immutable once fitted; training on newer data produces a new value.
/// Scoring expects vectors of exactly `feature_names().len()` values with
/// missing cells already imputed.
#[derive(Clone, Serialize, Deserialize)]
pub struct Forest {
    trees: Vec<Tree>,
    tree_count: usize,
    sample_size: usize,
    height_limit: usize,
    feature_names: Vec<String>,
}

impl Forest {
    /// Grows `options.tree_count` trees, each over a fresh subsample of
    /// rows drawn without replacement.
    ///
    /// An empty feature-name list or a row whose width differs from the
    /// feature count fails fast; an empty matrix is not an error and
    /// yields an ensemble of zero trees, which scores every vector as 0.0.
    pub fn fit(
        matrix: &[FeatureVector],
        feature_names: &[&str],
        options: &ForestOptions,
    ) -> Result<Self, Error> {
        if feature_names.is_empty() {
            return Err(Error::NoFeatures);
        }
        for (row, values) in matrix.iter().enumerate() {
            if values.len() != feature_names.len() {
                return Err(Error::RaggedMatrix {
                    row,
                    expected: feature_names.len(),
                    found: values.len(),
                });
            }
        }

        let height_limit = (options.sample_size as f64).log2().ceil() as usize;
        let trees = if matrix.is_empty() {
            Vec::new()
        } else {
            let rows_per_tree = options.sample_size.min(matrix.len());
            // Each tree grows over its own index subsample with no shared
            // mutable state, so construction parallelizes freely.
            (0..options.tree_count)
                .into_par_iter()
                .map(|_| {
                    let mut rng = rand::thread_rng();
                    let indices = index::sample(&mut rng, matrix.len(), rows_per_tree).into_vec();
                    Tree::grow(matrix, indices, &mut rng, height_limit)
                })
                .collect()
        };
        debug!(
            "fitted {} trees over {} rows ({} features, sample size {}, height limit {})",
            trees.len(),
            matrix.len(),
            feature_names.len(),
            options.sample_size,
            height_limit
        );

        Ok(Self {
            trees,
            tree_count: options.tree_count,
            sample_size: options.sample_size,
            height_limit,
            feature_names: feature_names.iter().map(|name| name.to_string()).collect(),
        })
    }

    /// Anomaly score in (0, 1]: the vector's average isolation path length
    /// across all trees, normalized as `2^(-avg / c(sample_size))`.
    ///
    /// Inference is deterministic; all randomness was baked into the
    /// stored splits at training time. An empty ensemble scores 0.0.
    pub fn score(&self, vector: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(vector))
            .sum();
        let avg_path = total / self.trees.len() as f64;
        2.0_f64.powf(-avg_path / c_factor(self.sample_size.max(2)))
    }

    /// Scores each row independently, in parallel.
    pub fn score_batch(&self, matrix: &[FeatureVector]) -> Vec<f64> {
        matrix.par_iter().map(|row| self.score(row)).collect()
    }

    /// Scores the vector and labels it against `threshold`
    /// (see [`DEFAULT_ANOMALY_THRESHOLD`]).
    pub fn predict(&self, vector: &[f64], threshold: f64) -> Prediction {
        let score = self.score(vector);
        Prediction {
            score,
            is_anomaly: score >= threshold,
        }
    }

    /// Ordered feature names the forest was fitted with.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Configured ensemble size.
    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    /// Configured per-tree subsample size.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Derived height limit, `ceil(log2(sample_size))`.
    pub fn height_limit(&self) -> usize {
        self.height_limit
    }
}

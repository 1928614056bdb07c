use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Forest;

/// Format version written into every stored model. Bumped whenever the
/// encoded structure changes incompatibly, so old readers reject new
/// payloads instead of misinterpreting them.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// A transportable snapshot of a fitted [`Forest`].
///
/// The encoding is structural and order-preserving: every node's tag,
/// split feature, split value and leaf size is stored, along with the
/// hyperparameters and feature names. Since all randomness is baked into
/// the stored splits at training time, a reconstructed forest scores every
/// vector bit-identically to the original.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredModel {
    format_version: u32,
    forest: Forest,
}

impl StoredModel {
    pub fn from_forest(forest: &Forest) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            forest: forest.clone(),
        }
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Recovers the forest, rejecting payloads written by an unknown
    /// format version.
    pub fn into_forest(self) -> Result<Forest, Error> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::UnsupportedModelVersion {
                found: self.format_version,
            });
        }
        Ok(self.forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ForestOptions;

    fn fitted_forest() -> Forest {
        let matrix: Vec<Vec<f64>> = (0..120)
            .map(|i| vec![20.0 + (i % 12) as f64 * 0.05, 70.0 - (i % 7) as f64 * 0.05])
            .collect();
        let options = ForestOptions {
            tree_count: 25,
            sample_size: 64,
        };
        Forest::fit(&matrix, &["latitude", "longitude"], &options).unwrap()
    }

    #[test]
    fn round_trip_scores_bit_identically() {
        let forest = fitted_forest();
        let encoded = serde_json::to_string(&StoredModel::from_forest(&forest)).unwrap();
        let restored: StoredModel = serde_json::from_str(&encoded).unwrap();
        let restored = restored.into_forest().unwrap();

        let probes = [
            vec![20.3, 69.8],
            vec![20.0, 70.0],
            vec![500.0, -500.0],
            vec![f64::NAN, 70.0],
        ];
        for probe in &probes {
            assert_eq!(
                forest.score(probe).to_bits(),
                restored.score(probe).to_bits()
            );
        }
        assert_eq!(forest.feature_names(), restored.feature_names());
    }

    #[test]
    fn unknown_format_version_is_rejected() {
        let forest = fitted_forest();
        let mut encoded = serde_json::to_value(StoredModel::from_forest(&forest)).unwrap();
        encoded["format_version"] = serde_json::json!(99);

        let tampered: StoredModel = serde_json::from_value(encoded).unwrap();
        match tampered.into_forest() {
            Err(Error::UnsupportedModelVersion { found }) => assert_eq!(found, 99),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("tampered model was accepted"),
        }
    }

    #[test]
    fn version_tag_is_current_on_new_snapshots() {
        let forest = fitted_forest();
        let stored = StoredModel::from_forest(&forest);
        assert_eq!(stored.format_version(), MODEL_FORMAT_VERSION);
        assert!(stored.into_forest().is_ok());
    }
}

//! Scoring oracle seam.
//!
//! The predictive model is an external collaborator: anything that maps a
//! batch of feature vectors to the same number of scalar scores. Failures are
//! reported as `OracleError` and the caller substitutes the composite score.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureVector;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle returned {got} scores for {expected} candidates")]
    LengthMismatch { expected: usize, got: usize },
    #[error("oracle returned a non-finite score at index {index}")]
    NonFinite { index: usize },
    #[error("oracle failed: {0}")]
    Failed(String),
}

/// Maps feature vectors to expected values.
pub trait ScoringOracle: Send + Sync {
    /// Human-readable name (e.g., "linear").
    fn name(&self) -> &str;

    /// Score a batch. Must return exactly one score per input.
    fn score(&self, features: &[FeatureVector]) -> Result<Vec<f64>, OracleError>;
}

/// Run the oracle and check its output contract.
pub fn checked_scores(
    oracle: &dyn ScoringOracle,
    features: &[FeatureVector],
) -> Result<Vec<f64>, OracleError> {
    let scores = oracle.score(features)?;
    if scores.len() != features.len() {
        return Err(OracleError::LengthMismatch {
            expected: features.len(),
            got: scores.len(),
        });
    }
    if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
        return Err(OracleError::NonFinite { index });
    }
    Ok(scores)
}

/// Linear model over named features: `intercept + Σ weight[name] · feature[name]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearOracle {
    #[serde(default)]
    pub intercept: f64,
    pub weights: BTreeMap<String, f64>,
    #[serde(skip)]
    resolved: Vec<(usize, f64)>,
}

impl LinearOracle {
    pub fn new(intercept: f64, weights: BTreeMap<String, f64>) -> Result<Self, OracleError> {
        let resolved = weights
            .iter()
            .map(|(name, w)| {
                FeatureVector::index_of(name)
                    .map(|i| (i, *w))
                    .ok_or_else(|| OracleError::Unavailable(format!("unknown feature '{name}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            intercept,
            weights,
            resolved,
        })
    }

    /// Load model parameters from JSON: `{"intercept": 0.5, "weights": {"baseline": 0.8}}`.
    pub fn from_json_str(raw: &str) -> Result<Self, OracleError> {
        let parsed: LinearOracle =
            serde_json::from_str(raw).map_err(|e| OracleError::Unavailable(e.to_string()))?;
        Self::new(parsed.intercept, parsed.weights)
    }
}

impl ScoringOracle for LinearOracle {
    fn name(&self) -> &str {
        "linear"
    }

    fn score(&self, features: &[FeatureVector]) -> Result<Vec<f64>, OracleError> {
        Ok(features
            .iter()
            .map(|f| {
                let x = f.to_array();
                self.intercept + self.resolved.iter().map(|(i, w)| w * x[*i]).sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl ScoringOracle for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn score(&self, features: &[FeatureVector]) -> Result<Vec<f64>, OracleError> {
            Ok(vec![1.0; features.len() + 1])
        }
    }

    struct NanOracle;

    impl ScoringOracle for NanOracle {
        fn name(&self) -> &str {
            "nan"
        }
        fn score(&self, features: &[FeatureVector]) -> Result<Vec<f64>, OracleError> {
            Ok(vec![f64::NAN; features.len()])
        }
    }

    #[test]
    fn linear_oracle_scores_named_features() {
        let oracle = LinearOracle::from_json_str(
            r#"{"intercept": 1.0, "weights": {"baseline": 2.0, "price": -0.5}}"#,
        )
        .unwrap();
        let f = FeatureVector {
            baseline: 3.0,
            price: 4.0,
            ..FeatureVector::default()
        };
        assert_eq!(checked_scores(&oracle, &[f]).unwrap(), vec![1.0 + 6.0 - 2.0]);
    }

    #[test]
    fn unknown_feature_is_rejected_at_load() {
        let err = LinearOracle::from_json_str(r#"{"weights": {"shoe_size": 1.0}}"#).unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }

    #[test]
    fn malformed_json_is_unavailable() {
        assert!(LinearOracle::from_json_str("{not json").is_err());
    }

    #[test]
    fn length_mismatch_is_detected() {
        let err = checked_scores(&Broken, &[FeatureVector::default()]).unwrap_err();
        assert_eq!(err, OracleError::LengthMismatch { expected: 1, got: 2 });
    }

    #[test]
    fn non_finite_output_is_detected() {
        let err = checked_scores(&NanOracle, &[FeatureVector::default()]).unwrap_err();
        assert_eq!(err, OracleError::NonFinite { index: 0 });
    }
}

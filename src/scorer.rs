use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::features::FeatureVector;

pub const FEATURE_COUNT: usize = 8;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model expects {expected} weights, artifact has {actual}")]
    WeightCount { expected: usize, actual: usize },
    #[error("model produced a non-finite probability")]
    NonFinite,
}

/// Exported logistic-regression coefficients over the eight-feature vector.
/// The training side standardizes features before fitting, so the artifact
/// optionally carries the per-feature means and scales it used.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default)]
    pub feature_means: Option<Vec<f64>>,
    #[serde(default)]
    pub feature_scales: Option<Vec<f64>>,
}

impl ModelArtifact {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&content)?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.weights.len() != FEATURE_COUNT {
            return Err(ModelError::WeightCount {
                expected: FEATURE_COUNT,
                actual: self.weights.len(),
            });
        }
        for params in [&self.feature_means, &self.feature_scales].into_iter().flatten() {
            if params.len() != FEATURE_COUNT {
                return Err(ModelError::WeightCount {
                    expected: FEATURE_COUNT,
                    actual: params.len(),
                });
            }
        }
        Ok(())
    }

    /// Positive-class probability for one feature vector.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.validate()?;
        let raw = features.as_array();
        let mut z = self.bias;
        for i in 0..FEATURE_COUNT {
            let mut x = raw[i];
            if let Some(means) = &self.feature_means {
                x -= means[i];
            }
            if let Some(scales) = &self.feature_scales {
                let scale = scales[i];
                if scale.abs() > f64::EPSILON {
                    x /= scale;
                }
            }
            z += self.weights[i] * x;
        }
        let probability = 1.0 / (1.0 + (-z).exp());
        if !probability.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(probability)
    }
}

#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Fixed weighted-rule classifier, used when no model is available or usable.
/// Each fired rule contributes its weight and a reason tag; the sum is capped
/// at 1.0.
pub fn heuristic_score(features: &FeatureVector) -> ScoreResult {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();
    if features.chunk_count >= 6 {
        score += 0.40;
        reasons.push("high_chunk_count".to_string());
    }
    if features.avg_chunk_size < 150.0 {
        score += 0.25;
        reasons.push("small_chunks".to_string());
    }
    if features.entropy > 4.0 {
        score += 0.20;
        reasons.push("high_entropy".to_string());
    }
    if features.printable_ratio < 0.5 {
        score += 0.20;
        reasons.push("low_printable_ratio".to_string());
    }
    ScoreResult {
        score: score.min(1.0),
        reasons,
    }
}

/// Scoring backend, chosen once at startup: the model if an artifact loaded,
/// otherwise the heuristic. A model that fails at inference time falls back
/// to the heuristic per call rather than aborting the pipeline.
pub enum Scorer {
    Model(ModelArtifact),
    Heuristic,
}

impl Scorer {
    pub fn from_model_path(model_path: Option<&str>) -> Self {
        let path = match model_path {
            Some(path) => path,
            None => {
                log::info!("No model configured, using heuristic scorer");
                return Scorer::Heuristic;
            }
        };
        match ModelArtifact::from_file(Path::new(path)) {
            Ok(artifact) => {
                log::info!("Loaded model artifact: {path}");
                Scorer::Model(artifact)
            }
            Err(e) => {
                log::warn!("Failed to load model artifact {path}: {e}; using heuristic scorer");
                Scorer::Heuristic
            }
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Scorer::Model(_))
    }

    pub fn score(&self, features: &FeatureVector) -> ScoreResult {
        match self {
            Scorer::Model(model) => match model.predict(features) {
                Ok(score) => ScoreResult {
                    score,
                    reasons: vec!["ml_model".to_string()],
                },
                Err(e) => {
                    log::warn!("Model inference failed ({e}), falling back to heuristic");
                    let mut result = heuristic_score(features);
                    result
                        .reasons
                        .insert(0, "heuristic_after_model_failure".to_string());
                    result
                }
            },
            Scorer::Heuristic => {
                let mut result = heuristic_score(features);
                result.reasons.insert(0, "heuristic_fallback".to_string());
                result
            }
        }
    }
}

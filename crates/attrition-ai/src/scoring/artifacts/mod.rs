//! Serialized model and preprocessing artifacts.
//!
//! Both files are JSON exported from the training environment; they are loaded once at startup
//! and shared read-only afterwards.

mod forest;
mod preprocess;
mod tree_shap;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::info;

use super::service::AttritionScoringService;
use crate::config::ExplanationConfig;

pub use forest::{DecisionTree, RandomForest, TreeNode};
pub use preprocess::{CategoricalColumn, ColumnPipeline, ColumnTransformer, ScaledColumn};

/// Scoring service backed by the loaded artifacts.
pub type ArtifactScoringService = AttritionScoringService<ColumnPipeline, RandomForest>;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("model artifact not found at {}; run training first", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid artifact {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Fitted preprocessing pipeline and classifier, checked against each other.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pipeline: ColumnPipeline,
    model: RandomForest,
}

impl ModelArtifacts {
    pub fn load(model_path: &Path, pipeline_path: &Path) -> Result<Self, ArtifactError> {
        for path in [model_path, pipeline_path] {
            if !path.exists() {
                return Err(ArtifactError::Missing {
                    path: path.to_path_buf(),
                });
            }
        }

        let model: RandomForest = read_json(model_path)?;
        let problems = model.problems();
        if !problems.is_empty() {
            return Err(ArtifactError::Invalid {
                path: model_path.to_path_buf(),
                reason: problems.join("; "),
            });
        }

        let pipeline: ColumnPipeline = read_json(pipeline_path)?;
        let problems = pipeline.problems();
        if !problems.is_empty() {
            return Err(ArtifactError::Invalid {
                path: pipeline_path.to_path_buf(),
                reason: problems.join("; "),
            });
        }

        if pipeline.width() != model.n_features {
            return Err(ArtifactError::Invalid {
                path: pipeline_path.to_path_buf(),
                reason: format!(
                    "pipeline produces {} features but the model expects {}",
                    pipeline.width(),
                    model.n_features
                ),
            });
        }
        let artifacts = Self { pipeline, model };

        info!(
            trees = artifacts.model.trees.len(),
            features = artifacts.model.n_features,
            base_value = artifacts
                .model
                .expected_values()
                .get(artifacts.model.positive_index())
                .copied()
                .unwrap_or_default(),
            model = %model_path.display(),
            "loaded model artifacts"
        );

        Ok(artifacts)
    }

    pub fn into_service(self, defaults: ExplanationConfig) -> ArtifactScoringService {
        AttritionScoringService::new(Arc::new(self.pipeline), Arc::new(self.model), defaults)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

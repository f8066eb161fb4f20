use ndarray::{Array1, Array2, ArrayView2};

use super::attribution::AttributionOutput;
use super::domain::Record;

/// Feature matrix plus the column names the transformer produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedBatch {
    pub matrix: Array2<f64>,
    pub feature_names: Vec<String>,
}

/// Failures raised while turning records into features or features into model outputs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("record {row} is missing field '{column}'")]
    MissingField { row: usize, column: String },
    #[error("record {row} field '{column}' must be numeric, got '{value}'")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },
    #[error("record {row} field '{column}' must be finite, got {value}")]
    NonFinite { row: usize, column: String, value: f64 },
    #[error("model expects {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },
}

/// Maps raw records to a fixed-width numeric matrix.
pub trait FeatureTransformer: Send + Sync {
    fn feature_names(&self) -> Vec<String>;
    fn transform(&self, records: &[Record]) -> Result<TransformedBatch, ModelError>;
}

/// Maps a feature matrix to the positive-class probability of each row.
pub trait ProbabilityEstimator: Send + Sync {
    fn model_type(&self) -> &str;
    fn predict_positive(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError>;
}

/// Maps a feature matrix to signed per-feature contributions.
pub trait AttributionEstimator: Send + Sync {
    fn explain(&self, features: ArrayView2<'_, f64>) -> Result<AttributionOutput, ModelError>;
}

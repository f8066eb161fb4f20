//! Attrition scoring: feature transformation, probability estimation, attribution, and the
//! ranking pipeline that turns them into explained top-N results.
//!
//! The pipeline itself is model-agnostic; it only sees aligned matrices. The concrete
//! artifacts (a column pipeline and a random forest with exact TreeSHAP) live in `artifacts`.

pub mod artifacts;
pub mod attribution;
pub mod dataset;
pub mod domain;
pub mod estimators;
pub mod pipeline;
pub mod router;
pub mod service;
pub mod static_api;

#[cfg(test)]
mod tests;

pub use artifacts::{
    ArtifactError, ArtifactScoringService, ColumnPipeline, ModelArtifacts, RandomForest,
};
pub use attribution::{AttributionOutput, POSITIVE_CLASS};
pub use dataset::{load_records, records_from_reader, DatasetError};
pub use domain::{
    EmployeeRecord, FeatureImpact, FieldValue, ModelInfo, RankedResultSet, Record,
    RecordLimit, RecordLimitParseError, RecordResult,
};
pub use estimators::{
    AttributionEstimator, FeatureTransformer, ModelError, ProbabilityEstimator, TransformedBatch,
};
pub use pipeline::{
    rank_and_explain, ExplanationInputs, ExplanationPolicy, PipelineError, ScoringMode,
};
pub use router::{scoring_router, PredictQuery, ScoringState};
pub use service::{AttritionScoringService, ScoringError};
pub use static_api::{write_static_api, StaticApiError, DEFAULT_BASE_PATH};

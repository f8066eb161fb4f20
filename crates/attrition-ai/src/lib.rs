//! Attrition risk scoring: artifact-backed estimators, SHAP explanations, and the ranking
//! pipeline that turns them into ranked, explained results.

pub mod config;
pub mod error;
pub mod scoring;
pub mod telemetry;

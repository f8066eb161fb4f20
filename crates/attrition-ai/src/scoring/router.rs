use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{EmployeeRecord, ModelInfo, RankedResultSet, Record, RecordLimit};
use super::estimators::{AttributionEstimator, FeatureTransformer, ProbabilityEstimator};
use super::pipeline::{PipelineError, ScoringMode};
use super::service::{AttritionScoringService, ScoringError};

/// Shared state for the scoring endpoints. Everything here is read-only after startup.
pub struct ScoringState<T, M> {
    pub service: Arc<AttritionScoringService<T, M>>,
    pub top_employees: Arc<RankedResultSet>,
    pub model_info: Arc<ModelInfo>,
}

impl<T, M> Clone for ScoringState<T, M> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            top_employees: Arc::clone(&self.top_employees),
            model_info: Arc::clone(&self.model_info),
        }
    }
}

/// Optional per-request overrides for `/predict`.
#[derive(Debug, Default, Deserialize)]
pub struct PredictQuery {
    pub top_n: Option<RecordLimit>,
    pub top_k: Option<usize>,
}

/// Router builder exposing the cached ranking, on-demand prediction, and model metadata.
pub fn scoring_router<T, M>(state: ScoringState<T, M>) -> Router
where
    T: FeatureTransformer + 'static,
    M: ProbabilityEstimator + AttributionEstimator + 'static,
{
    Router::new()
        .route("/top_employees", get(top_employees_handler::<T, M>))
        .route("/predict", post(predict_handler::<T, M>))
        .route("/model-info", get(model_info_handler::<T, M>))
        .with_state(state)
}

pub(crate) async fn top_employees_handler<T, M>(
    State(state): State<ScoringState<T, M>>,
) -> Response
where
    T: FeatureTransformer + 'static,
    M: ProbabilityEstimator + AttributionEstimator + 'static,
{
    (StatusCode::OK, axum::Json(state.top_employees.as_ref())).into_response()
}

pub(crate) async fn model_info_handler<T, M>(State(state): State<ScoringState<T, M>>) -> Response
where
    T: FeatureTransformer + 'static,
    M: ProbabilityEstimator + AttributionEstimator + 'static,
{
    (StatusCode::OK, axum::Json(state.model_info.as_ref())).into_response()
}

pub(crate) async fn predict_handler<T, M>(
    State(state): State<ScoringState<T, M>>,
    Query(query): Query<PredictQuery>,
    axum::Json(employees): axum::Json<Vec<EmployeeRecord>>,
) -> Response
where
    T: FeatureTransformer + 'static,
    M: ProbabilityEstimator + AttributionEstimator + 'static,
{
    let mut policy = state.service.policy(ScoringMode::OnDemand);
    if let Some(top_n) = query.top_n {
        policy = policy.with_top_n(top_n);
    }
    if let Some(top_k) = query.top_k {
        policy = policy.with_top_k(top_k);
    }

    let records: Vec<Record> = employees.into_iter().map(Record::from).collect();

    match state.service.score(&records, &policy) {
        Ok(ranked) => (StatusCode::OK, axum::Json(ranked)).into_response(),
        Err(error) => {
            let status = status_for(&error);
            warn!(%error, status = status.as_u16(), "prediction rejected");
            let payload = json!({
                "error": error.to_string(),
            });
            (status, axum::Json(payload)).into_response()
        }
    }
}

fn status_for(error: &ScoringError) -> StatusCode {
    match error {
        ScoringError::Pipeline(PipelineError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
        ScoringError::Model(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScoringError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

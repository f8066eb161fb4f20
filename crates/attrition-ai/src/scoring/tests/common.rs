use std::sync::Arc;

use axum::response::Response;
use axum::Router;
use ndarray::{Array1, Array2, ArrayView2};
use serde_json::Value;

use crate::config::ExplanationConfig;
use crate::scoring::attribution::AttributionOutput;
use crate::scoring::domain::{
    EmployeeRecord, FieldValue, RankedResultSet, Record, RecordLimit,
};
use crate::scoring::estimators::{
    AttributionEstimator, FeatureTransformer, ModelError, ProbabilityEstimator, TransformedBatch,
};
use crate::scoring::pipeline::ScoringMode;
use crate::scoring::{scoring_router, AttritionScoringService, ScoringState};

pub(super) const COLUMNS: [&str; 3] = ["Age", "NumCompaniesWorked", "StockOptionLevel"];
pub(super) const WEIGHTS: [f64; 3] = [0.02, 0.3, -0.6];

/// Reads a fixed set of numeric columns without scaling.
pub(super) struct StubTransformer;

impl FeatureTransformer for StubTransformer {
    fn feature_names(&self) -> Vec<String> {
        COLUMNS.iter().map(|column| format!("num__{column}")).collect()
    }

    fn transform(&self, records: &[Record]) -> Result<TransformedBatch, ModelError> {
        let mut matrix = Array2::<f64>::zeros((records.len(), COLUMNS.len()));
        for (row, record) in records.iter().enumerate() {
            for (column, name) in COLUMNS.iter().enumerate() {
                matrix[[row, column]] = match record.get(name) {
                    Some(FieldValue::Number(value)) => *value,
                    Some(FieldValue::Category(raw)) => {
                        return Err(ModelError::NonNumeric {
                            row,
                            column: name.to_string(),
                            value: raw.clone(),
                        })
                    }
                    None => {
                        return Err(ModelError::MissingField {
                            row,
                            column: name.to_string(),
                        })
                    }
                };
            }
        }

        Ok(TransformedBatch {
            matrix,
            feature_names: self.feature_names(),
        })
    }
}

/// How the stub model shapes its attribution output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StubOutput {
    PerClass,
    Single,
    NegativeClassOnly,
    NanProbability,
}

/// Linear model: contribution `w * x`, probability `sigmoid(sum)`.
pub(super) struct StubModel {
    pub(super) output: StubOutput,
}

impl StubModel {
    pub(super) fn new(output: StubOutput) -> Self {
        Self { output }
    }

    fn contributions(&self, features: ArrayView2<'_, f64>) -> Array2<f64> {
        let weights = Array1::from(WEIGHTS.to_vec());
        &features * &weights
    }
}

impl ProbabilityEstimator for StubModel {
    fn model_type(&self) -> &str {
        "StubLinearModel"
    }

    fn predict_positive(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        if features.ncols() != WEIGHTS.len() {
            return Err(ModelError::FeatureCount {
                expected: WEIGHTS.len(),
                actual: features.ncols(),
            });
        }
        if self.output == StubOutput::NanProbability {
            return Ok(Array1::from_elem(features.nrows(), f64::NAN));
        }

        let logits = self.contributions(features).sum_axis(ndarray::Axis(1));
        Ok(logits.mapv(|logit| 1.0 / (1.0 + (-logit).exp())))
    }
}

impl AttributionEstimator for StubModel {
    fn explain(&self, features: ArrayView2<'_, f64>) -> Result<AttributionOutput, ModelError> {
        let positive = self.contributions(features);
        Ok(match self.output {
            StubOutput::Single => AttributionOutput::SingleMatrix(positive),
            StubOutput::NegativeClassOnly => {
                AttributionOutput::PerClassMatrices(vec![positive.mapv(|value| -value)])
            }
            StubOutput::PerClass | StubOutput::NanProbability => {
                AttributionOutput::PerClassMatrices(vec![positive.mapv(|value| -value), positive])
            }
        })
    }
}

pub(super) type StubService = AttritionScoringService<StubTransformer, StubModel>;

pub(super) fn explanation_config() -> ExplanationConfig {
    ExplanationConfig {
        top_k_features: 2,
        top_n_records: RecordLimit::Top(2),
        batch_zero_filter: false,
        on_demand_zero_filter: true,
    }
}

pub(super) fn build_service(output: StubOutput) -> StubService {
    AttritionScoringService::new(
        Arc::new(StubTransformer),
        Arc::new(StubModel::new(output)),
        explanation_config(),
    )
}

pub(super) fn record(age: f64, companies: f64, stock: f64) -> Record {
    Record::new()
        .with("Age", age)
        .with("NumCompaniesWorked", companies)
        .with("StockOptionLevel", stock)
}

/// Four records whose probabilities rank 1, 3, 0, 2.
pub(super) fn batch() -> Vec<Record> {
    vec![
        record(30.0, 1.0, 1.0),
        record(50.0, 6.0, 0.0),
        record(25.0, 0.0, 3.0),
        record(40.0, 3.0, 0.0),
    ]
}

pub(super) fn employee(age: i64, companies: i64, stock: i64) -> EmployeeRecord {
    EmployeeRecord {
        age,
        business_travel: "Travel_Rarely".to_string(),
        daily_rate: 800,
        department: "Research & Development".to_string(),
        distance_from_home: 4,
        education: 3,
        education_field: "Medical".to_string(),
        environment_satisfaction: 3,
        gender: "Male".to_string(),
        hourly_rate: 60,
        job_involvement: 3,
        job_level: 2,
        job_role: "Laboratory Technician".to_string(),
        job_satisfaction: 3,
        marital_status: "Married".to_string(),
        monthly_income: 4200,
        monthly_rate: 14000,
        num_companies_worked: companies,
        over_time: "No".to_string(),
        percent_salary_hike: 14,
        performance_rating: 3,
        relationship_satisfaction: 3,
        stock_option_level: stock,
        total_working_years: 10,
        training_times_last_year: 3,
        work_life_balance: 3,
        years_at_company: 5,
        years_in_current_role: 3,
        years_since_last_promotion: 1,
        years_with_curr_manager: 3,
    }
}

/// Cached ranking always comes from a healthy model so broken outputs only affect `/predict`.
pub(super) fn startup_ranking() -> RankedResultSet {
    let service = build_service(StubOutput::PerClass);
    service
        .score(&batch(), &service.policy(ScoringMode::Batch))
        .expect("startup batch scores")
}

pub(super) fn scoring_router_with(output: StubOutput) -> Router {
    let service = Arc::new(build_service(output));
    let cached = startup_ranking();
    let model_info = service.model_info();

    scoring_router(ScoringState {
        service,
        top_employees: Arc::new(cached),
        model_info: Arc::new(model_info),
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

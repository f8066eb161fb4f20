use crate::infra::AppState;
use attrition_ai::scoring::{scoring_router, ColumnPipeline, RandomForest, ScoringState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;

/// Scoring endpoints plus the operational probes.
pub(crate) fn with_scoring_routes(
    state: ScoringState<ColumnPipeline, RandomForest>,
) -> axum::Router {
    scoring_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ScoringRuntime;
    use attrition_ai::config::{AppConfig, ArtifactConfig};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../crates/attrition-ai/tests/fixtures")
            .join(name)
    }

    fn config() -> AppConfig {
        AppConfig {
            environment: attrition_ai::config::AppEnvironment::Test,
            server: attrition_ai::config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            telemetry: attrition_ai::config::TelemetryConfig {
                log_level: "info".to_string(),
                format: attrition_ai::config::LogFormat::Compact,
            },
            artifacts: ArtifactConfig {
                model_path: fixture("model.json"),
                pipeline_path: fixture("pipeline.json"),
                dataset_path: fixture("employees.csv"),
            },
            explanation: Default::default(),
        }
    }

    fn app(ready: bool) -> axum::Router {
        let config = config();
        let runtime = ScoringRuntime::load(&config).expect("fixture artifacts load");
        let top_employees = runtime
            .startup_ranking(&config.artifacts.dataset_path)
            .expect("startup ranking");
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };

        with_scoring_routes(ScoringState {
            service: runtime.service,
            top_employees: Arc::new(top_employees),
            model_info: Arc::new(runtime.model_info),
        })
        .layer(Extension(state))
    }

    async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = get(app(true), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let response = get(app(false), "/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "initializing");

        let response = get(app(true), "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn metrics_render_prometheus_text() {
        let response = get(app(true), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn scoring_routes_are_mounted() {
        let response = get(app(true), "/top_employees").await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload.as_array().map(Vec::len), Some(5));

        let response = get(app(true), "/model-info").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["n_features"], 4);
    }
}

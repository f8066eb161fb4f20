use crate::cli::ServeArgs;
use crate::infra::{AppState, ScoringRuntime};
use crate::routes::with_scoring_routes;
use attrition_ai::config::AppConfig;
use attrition_ai::error::AppError;
use attrition_ai::scoring::ScoringState;
use attrition_ai::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let runtime = ScoringRuntime::load(&config)?;
    let top_employees = runtime.startup_ranking(&config.artifacts.dataset_path)?;
    let scoring_state = ScoringState {
        service: runtime.service,
        top_employees: Arc::new(top_employees),
        model_info: Arc::new(runtime.model_info),
    };

    let app = with_scoring_routes(scoring_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer)
        .layer(CorsLayer::permissive());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "attrition prediction api ready");

    axum::serve(listener, app).await?;
    Ok(())
}

use attrition_ai::config::AppConfig;
use attrition_ai::error::AppError;
use attrition_ai::scoring::{
    load_records, ArtifactScoringService, ModelArtifacts, ModelInfo, RankedResultSet, ScoringMode,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Loaded artifacts wrapped in a shareable scoring service.
pub(crate) struct ScoringRuntime {
    pub(crate) service: Arc<ArtifactScoringService>,
    pub(crate) model_info: ModelInfo,
}

impl ScoringRuntime {
    /// Missing or invalid artifacts are fatal; there is no fallback model.
    pub(crate) fn load(config: &AppConfig) -> Result<Self, AppError> {
        let artifacts = ModelArtifacts::load(
            &config.artifacts.model_path,
            &config.artifacts.pipeline_path,
        )?;
        let service = Arc::new(artifacts.into_service(config.explanation.clone()));
        let model_info = service.model_info();

        Ok(Self {
            service,
            model_info,
        })
    }

    /// Score the whole dataset with the batch policy to build the cached ranking.
    pub(crate) fn startup_ranking(&self, dataset: &Path) -> Result<RankedResultSet, AppError> {
        let records = load_records(dataset)?;
        let policy = self.service.policy(ScoringMode::Batch);
        let ranked = self.service.score(&records, &policy)?;

        info!(
            dataset = %dataset.display(),
            records = records.len(),
            cached = ranked.len(),
            "startup ranking computed"
        );
        Ok(ranked)
    }
}

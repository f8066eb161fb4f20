use std::sync::Arc;

use tracing::debug;

use super::domain::{ModelInfo, RankedResultSet, Record};
use super::estimators::{
    AttributionEstimator, FeatureTransformer, ModelError, ProbabilityEstimator,
};
use super::pipeline::{
    rank_and_explain, ExplanationInputs, ExplanationPolicy, PipelineError, ScoringMode,
};
use crate::config::ExplanationConfig;

/// Service composing the feature transformer, the classifier, and the explanation defaults.
pub struct AttritionScoringService<T, M> {
    transformer: Arc<T>,
    model: Arc<M>,
    defaults: ExplanationConfig,
}

impl<T, M> AttritionScoringService<T, M>
where
    T: FeatureTransformer + 'static,
    M: ProbabilityEstimator + AttributionEstimator + 'static,
{
    pub fn new(transformer: Arc<T>, model: Arc<M>, defaults: ExplanationConfig) -> Self {
        Self {
            transformer,
            model,
            defaults,
        }
    }

    pub fn policy(&self, mode: ScoringMode) -> ExplanationPolicy {
        self.defaults.policy(mode)
    }

    /// Describes the loaded classifier and the features it is fed.
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo::loaded(self.model.model_type(), self.transformer.feature_names())
    }

    /// Score a batch of records and return the ranked, explained subset.
    pub fn score(
        &self,
        records: &[Record],
        policy: &ExplanationPolicy,
    ) -> Result<RankedResultSet, ScoringError> {
        policy.validate()?;

        let batch = self.transformer.transform(records)?;
        let probabilities = self.model.predict_positive(batch.matrix.view())?;
        let contributions = self.model.explain(batch.matrix.view())?.positive_class()?;

        let inputs = ExplanationInputs {
            feature_matrix: batch.matrix.view(),
            feature_names: &batch.feature_names,
            probabilities: probabilities.view(),
            contributions: contributions.view(),
        };
        let ranked = rank_and_explain(&inputs, policy)?;

        debug!(
            records = records.len(),
            returned = ranked.len(),
            top_k = policy.top_k_features,
            top_n = %policy.top_n_records,
            zero_value_filter = policy.zero_value_filter,
            "scored batch"
        );

        Ok(ranked)
    }
}

/// Error raised by the scoring service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

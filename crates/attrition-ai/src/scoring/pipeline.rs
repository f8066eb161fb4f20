//! Ranking and explanation of a scored batch.
//!
//! Every record gets its top-K features by absolute contribution, then the batch is ordered by
//! probability and truncated to the requested number of records. Inputs are validated up front
//! so a misaligned or non-finite batch never produces partial output.

use std::cmp::Ordering;

use ndarray::{ArrayView1, ArrayView2};

use super::domain::{FeatureImpact, RankedResultSet, RecordLimit, RecordResult};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("data quality: {0}")]
    DataQuality(String),
}

/// Which entry point requested the scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Startup and offline scoring over a fixed dataset.
    Batch,
    /// Caller-supplied records scored per request.
    OnDemand,
}

/// Size limits and candidate filtering for one scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplanationPolicy {
    pub top_k_features: usize,
    pub top_n_records: RecordLimit,
    /// Drop features whose value in the record is exactly zero (one-hot categories that are off).
    pub zero_value_filter: bool,
}

impl Default for ExplanationPolicy {
    fn default() -> Self {
        Self {
            top_k_features: 5,
            top_n_records: RecordLimit::Top(5),
            zero_value_filter: false,
        }
    }
}

impl ExplanationPolicy {
    pub fn with_top_k(mut self, top_k_features: usize) -> Self {
        self.top_k_features = top_k_features;
        self
    }

    pub fn with_top_n(mut self, top_n_records: RecordLimit) -> Self {
        self.top_n_records = top_n_records;
        self
    }

    pub fn with_zero_value_filter(mut self, enabled: bool) -> Self {
        self.zero_value_filter = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.top_k_features == 0 {
            return Err(PipelineError::InvalidArgument(
                "top_k_features must be at least 1".to_string(),
            ));
        }
        if self.top_n_records == RecordLimit::Top(0) {
            return Err(PipelineError::InvalidArgument(
                "top_n_records must be at least 1 or 'all'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Aligned outputs of the transformer, probability estimator, and attribution estimator.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationInputs<'a> {
    pub feature_matrix: ArrayView2<'a, f64>,
    pub feature_names: &'a [String],
    pub probabilities: ArrayView1<'a, f64>,
    pub contributions: ArrayView2<'a, f64>,
}

impl ExplanationInputs<'_> {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let (rows, columns) = self.feature_matrix.dim();

        if self.feature_names.len() != columns {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} feature names for {columns} matrix columns",
                self.feature_names.len()
            )));
        }
        if self.probabilities.len() != rows {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} probabilities for {rows} feature rows",
                self.probabilities.len()
            )));
        }
        if self.contributions.dim() != (rows, columns) {
            let (contribution_rows, contribution_columns) = self.contributions.dim();
            return Err(PipelineError::ShapeMismatch(format!(
                "contributions are {contribution_rows}x{contribution_columns}, \
                 feature matrix is {rows}x{columns}"
            )));
        }

        if let Some(((row, column), value)) = self
            .feature_matrix
            .indexed_iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(PipelineError::DataQuality(format!(
                "feature '{}' for record {row} is {value}",
                self.feature_names[column]
            )));
        }

        for (row, probability) in self.probabilities.iter().enumerate() {
            if !probability.is_finite() {
                return Err(PipelineError::DataQuality(format!(
                    "probability for record {row} is {probability}"
                )));
            }
            if !(0.0..=1.0).contains(probability) {
                return Err(PipelineError::DataQuality(format!(
                    "probability for record {row} is outside [0, 1]: {probability}"
                )));
            }
        }

        if let Some(((row, column), value)) = self
            .contributions
            .indexed_iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(PipelineError::DataQuality(format!(
                "contribution of '{}' for record {row} is {value}",
                self.feature_names[column]
            )));
        }

        Ok(())
    }
}

/// Per-record ranking before names are attached.
struct ScoredRecord {
    row: usize,
    probability: f64,
    top_features: Vec<(usize, f64)>,
}

/// Rank a scored batch and attach per-record explanations.
pub fn rank_and_explain(
    inputs: &ExplanationInputs<'_>,
    policy: &ExplanationPolicy,
) -> Result<RankedResultSet, PipelineError> {
    policy.validate()?;
    inputs.validate()?;

    let mut scored: Vec<ScoredRecord> = (0..inputs.probabilities.len())
        .map(|row| ScoredRecord {
            row,
            probability: inputs.probabilities[row],
            top_features: top_features_for_row(inputs, row, policy),
        })
        .collect();

    // `sort_by` is stable, so equal probabilities stay in batch order.
    scored.sort_by(|a, b| descending(a.probability, b.probability));
    scored.truncate(policy.top_n_records.apply(scored.len()));

    let results = scored
        .into_iter()
        .map(|record| into_result(record, inputs.feature_names))
        .collect();

    Ok(RankedResultSet::from_sorted(results))
}

fn top_features_for_row(
    inputs: &ExplanationInputs<'_>,
    row: usize,
    policy: &ExplanationPolicy,
) -> Vec<(usize, f64)> {
    let values = inputs.feature_matrix.row(row);
    let mut candidates: Vec<(usize, f64)> = inputs
        .contributions
        .row(row)
        .iter()
        .copied()
        .enumerate()
        .filter(|(column, _)| !policy.zero_value_filter || values[*column] != 0.0)
        .collect();

    // Stable: equal magnitudes keep feature order.
    candidates.sort_by(|a, b| descending(a.1.abs(), b.1.abs()));
    candidates.truncate(policy.top_k_features);
    candidates
}

/// Output boundary: the only place indices become owned names and plain floats.
fn into_result(record: ScoredRecord, feature_names: &[String]) -> RecordResult {
    RecordResult {
        record_index: record.row,
        probability: record.probability,
        top_features: record
            .top_features
            .into_iter()
            .map(|(column, impact)| FeatureImpact {
                feature: feature_names[column].clone(),
                impact,
            })
            .collect(),
    }
}

// Inputs are validated finite, so `partial_cmp` always succeeds.
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    fn names(count: usize) -> Vec<String> {
        (1..=count).map(|index| format!("f{index}")).collect()
    }

    fn run(
        matrix: &Array2<f64>,
        probabilities: &Array1<f64>,
        contributions: &Array2<f64>,
        policy: ExplanationPolicy,
    ) -> Result<RankedResultSet, PipelineError> {
        let feature_names = names(matrix.ncols());
        let inputs = ExplanationInputs {
            feature_matrix: matrix.view(),
            feature_names: &feature_names,
            probabilities: probabilities.view(),
            contributions: contributions.view(),
        };
        rank_and_explain(&inputs, &policy)
    }

    #[test]
    fn top_two_records_are_highest_probabilities() {
        let probabilities = array![0.9, 0.1, 0.95, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.05];
        let matrix = Array2::from_elem((10, 3), 1.0);
        let contributions = Array2::from_elem((10, 3), 0.1);

        let ranked = run(
            &matrix,
            &probabilities,
            &contributions,
            ExplanationPolicy::default().with_top_n(RecordLimit::Top(2)),
        )
        .expect("valid batch");

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].record_index, 2);
        assert_eq!(ranked[0].probability, 0.95);
        assert_eq!(ranked[1].record_index, 0);
        assert_eq!(ranked[1].probability, 0.9);
    }

    #[test]
    fn features_rank_by_absolute_impact() {
        let ranked = run(
            &array![[1.0, 1.0, 1.0]],
            &array![0.4],
            &array![[0.3, -0.8, 0.1]],
            ExplanationPolicy::default().with_top_k(2),
        )
        .expect("valid batch");

        let features = &ranked[0].top_features;
        assert_eq!(
            features,
            &vec![
                FeatureImpact {
                    feature: "f2".to_string(),
                    impact: -0.8
                },
                FeatureImpact {
                    feature: "f1".to_string(),
                    impact: 0.3
                },
            ]
        );
    }

    #[test]
    fn row_count_mismatch_is_rejected() {
        let err = run(
            &Array2::zeros((5, 3)),
            &array![0.1, 0.2, 0.3, 0.4],
            &Array2::zeros((5, 3)),
            ExplanationPolicy::default(),
        )
        .expect_err("probabilities are short");
        assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    }

    #[test]
    fn contribution_shape_mismatch_is_rejected() {
        let err = run(
            &Array2::zeros((2, 3)),
            &array![0.1, 0.2],
            &Array2::zeros((2, 2)),
            ExplanationPolicy::default(),
        )
        .expect_err("contributions are narrow");
        assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    }

    #[test]
    fn feature_name_count_must_match_columns() {
        let matrix = Array2::zeros((1, 3));
        let contributions = Array2::zeros((1, 3));
        let probabilities = array![0.5];
        let short_names = names(2);
        let inputs = ExplanationInputs {
            feature_matrix: matrix.view(),
            feature_names: &short_names,
            probabilities: probabilities.view(),
            contributions: contributions.view(),
        };

        let err = rank_and_explain(&inputs, &ExplanationPolicy::default())
            .expect_err("names are short");
        assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    }

    #[test]
    fn nan_contribution_is_a_data_quality_error() {
        let err = run(
            &array![[1.0, 1.0], [1.0, 1.0]],
            &array![0.6, 0.4],
            &array![[0.1, f64::NAN], [0.2, 0.3]],
            ExplanationPolicy::default(),
        )
        .expect_err("NaN must not be ranked");
        assert!(matches!(err, PipelineError::DataQuality(_)));
        assert!(err.to_string().contains("f2"));
    }

    #[test]
    fn non_finite_feature_values_are_data_quality_errors() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = run(
                &array![[1.0, 1.0], [value, 1.0]],
                &array![0.6, 0.4],
                &array![[0.1, 0.2], [0.2, 0.3]],
                ExplanationPolicy::default(),
            )
            .expect_err("non-finite features must not be ranked");
            assert!(matches!(err, PipelineError::DataQuality(_)));
            assert!(err.to_string().contains("f1"));
        }
    }

    #[test]
    fn non_finite_or_out_of_range_probability_is_rejected() {
        for probability in [f64::INFINITY, f64::NAN, 1.5, -0.1] {
            let err = run(
                &array![[1.0]],
                &array![probability],
                &array![[0.1]],
                ExplanationPolicy::default(),
            )
            .expect_err("bad probability");
            assert!(matches!(err, PipelineError::DataQuality(_)));
        }
    }

    #[test]
    fn zero_sizes_are_invalid_arguments() {
        let matrix = array![[1.0]];
        let probabilities = array![0.5];
        let contributions = array![[0.1]];

        let err = run(
            &matrix,
            &probabilities,
            &contributions,
            ExplanationPolicy::default().with_top_k(0),
        )
        .expect_err("k = 0");
        assert!(matches!(err, PipelineError::InvalidArgument(_)));

        let err = run(
            &matrix,
            &probabilities,
            &contributions,
            ExplanationPolicy::default().with_top_n(RecordLimit::Top(0)),
        )
        .expect_err("n = 0");
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn equal_probabilities_keep_batch_order() {
        let ranked = run(
            &Array2::from_elem((4, 1), 1.0),
            &array![0.5, 0.7, 0.5, 0.7],
            &Array2::from_elem((4, 1), 0.1),
            ExplanationPolicy::default().with_top_n(RecordLimit::All),
        )
        .expect("valid batch");

        let order: Vec<usize> = ranked.iter().map(|result| result.record_index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn equal_magnitudes_keep_feature_order() {
        let ranked = run(
            &array![[1.0, 1.0, 1.0, 1.0]],
            &array![0.5],
            &array![[0.2, -0.5, 0.5, -0.2]],
            ExplanationPolicy::default().with_top_k(4),
        )
        .expect("valid batch");

        let order: Vec<&str> = ranked[0]
            .top_features
            .iter()
            .map(|impact| impact.feature.as_str())
            .collect();
        assert_eq!(order, vec!["f2", "f3", "f1", "f4"]);
    }

    #[test]
    fn zero_value_filter_drops_inactive_features() {
        let matrix = array![[0.0, 1.0, 0.0, -0.3]];
        let probabilities = array![0.8];
        let contributions = array![[0.9, 0.1, -0.7, 0.05]];

        let unfiltered = run(
            &matrix,
            &probabilities,
            &contributions,
            ExplanationPolicy::default(),
        )
        .expect("valid batch");
        assert_eq!(unfiltered[0].top_features.len(), 4);
        assert_eq!(unfiltered[0].top_features[0].feature, "f1");

        let filtered = run(
            &matrix,
            &probabilities,
            &contributions,
            ExplanationPolicy::default().with_zero_value_filter(true),
        )
        .expect("valid batch");
        let kept: Vec<&str> = filtered[0]
            .top_features
            .iter()
            .map(|impact| impact.feature.as_str())
            .collect();
        assert_eq!(kept, vec!["f2", "f4"]);
    }

    #[test]
    fn short_candidate_lists_are_not_padded() {
        let ranked = run(
            &array![[1.0, 1.0]],
            &array![0.5],
            &array![[0.1, 0.2]],
            ExplanationPolicy::default().with_top_k(5),
        )
        .expect("valid batch");
        assert_eq!(ranked[0].top_features.len(), 2);
    }

    #[test]
    fn empty_batch_yields_empty_result() {
        let ranked = run(
            &Array2::zeros((0, 3)),
            &Array1::zeros(0),
            &Array2::zeros((0, 3)),
            ExplanationPolicy::default(),
        )
        .expect("empty batch is valid");
        assert!(ranked.is_empty());
    }
}

use ndarray::Array2;

use super::pipeline::PipelineError;

/// Class index whose probability and attributions are reported.
pub const POSITIVE_CLASS: usize = 1;

/// Raw attribution output as produced by an explainer.
///
/// Binary explainers may emit one `N x F` matrix, others emit one matrix per class.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributionOutput {
    SingleMatrix(Array2<f64>),
    PerClassMatrices(Vec<Array2<f64>>),
}

impl AttributionOutput {
    /// Resolve the positive-class contribution matrix.
    pub fn positive_class(self) -> Result<Array2<f64>, PipelineError> {
        match self {
            AttributionOutput::SingleMatrix(matrix) => Ok(matrix),
            AttributionOutput::PerClassMatrices(matrices) => {
                let classes = matrices.len();
                matrices.into_iter().nth(POSITIVE_CLASS).ok_or_else(|| {
                    PipelineError::ShapeMismatch(format!(
                        "attribution output holds {classes} class matrices; \
                         positive class index {POSITIVE_CLASS} is missing"
                    ))
                })
            }
        }
    }
}

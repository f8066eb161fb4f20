use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::scoring::domain::{FieldValue, Record};
use crate::scoring::estimators::{FeatureTransformer, ModelError, TransformedBatch};

/// Ordered column transformers; output columns follow declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPipeline {
    pub transformers: Vec<ColumnTransformer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnTransformer {
    StandardScaler {
        name: String,
        columns: Vec<ScaledColumn>,
    },
    OneHot {
        name: String,
        columns: Vec<CategoricalColumn>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledColumn {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
}

impl ScaledColumn {
    fn apply(&self, value: f64) -> f64 {
        // Constant columns were fitted with zero variance.
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        (value - self.mean) / scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub column: String,
    pub categories: Vec<String>,
}

impl ColumnTransformer {
    fn width(&self) -> usize {
        match self {
            ColumnTransformer::StandardScaler { columns, .. } => columns.len(),
            ColumnTransformer::OneHot { columns, .. } => {
                columns.iter().map(|column| column.categories.len()).sum()
            }
        }
    }

    fn push_names(&self, names: &mut Vec<String>) {
        match self {
            ColumnTransformer::StandardScaler { name, columns } => {
                names.extend(
                    columns
                        .iter()
                        .map(|column| format!("{name}__{}", column.column)),
                );
            }
            ColumnTransformer::OneHot { name, columns } => {
                for column in columns {
                    names.extend(
                        column
                            .categories
                            .iter()
                            .map(|category| format!("{name}__{}_{category}", column.column)),
                    );
                }
            }
        }
    }

    /// Write this transformer's block for one record into `out`.
    fn encode(&self, row: usize, record: &Record, out: &mut Vec<f64>) -> Result<(), ModelError> {
        match self {
            ColumnTransformer::StandardScaler { columns, .. } => {
                for column in columns {
                    let value = numeric_field(row, record, &column.column)?;
                    out.push(column.apply(value));
                }
            }
            ColumnTransformer::OneHot { columns, .. } => {
                for column in columns {
                    let value = categorical_field(row, record, &column.column)?;
                    // Unknown categories encode as all zeros.
                    out.extend(column.categories.iter().map(|category| {
                        if *category == value {
                            1.0
                        } else {
                            0.0
                        }
                    }));
                }
            }
        }
        Ok(())
    }
}

fn field<'a>(row: usize, record: &'a Record, column: &str) -> Result<&'a FieldValue, ModelError> {
    record.get(column).ok_or_else(|| ModelError::MissingField {
        row,
        column: column.to_string(),
    })
}

fn numeric_field(row: usize, record: &Record, column: &str) -> Result<f64, ModelError> {
    let value = match field(row, record, column)? {
        FieldValue::Number(value) => *value,
        FieldValue::Category(raw) => {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| ModelError::NonNumeric {
                    row,
                    column: column.to_string(),
                    value: raw.clone(),
                })?
        }
    };
    if !value.is_finite() {
        return Err(ModelError::NonFinite {
            row,
            column: column.to_string(),
            value,
        });
    }
    Ok(value)
}

fn categorical_field(row: usize, record: &Record, column: &str) -> Result<String, ModelError> {
    Ok(match field(row, record, column)? {
        FieldValue::Category(raw) => raw.trim().to_string(),
        FieldValue::Number(value) if value.fract() == 0.0 && value.is_finite() => {
            format!("{}", *value as i64)
        }
        FieldValue::Number(value) => value.to_string(),
    })
}

impl ColumnPipeline {
    pub fn width(&self) -> usize {
        self.transformers.iter().map(ColumnTransformer::width).sum()
    }

    /// Problems that make the pipeline unusable; empty when valid.
    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for transformer in &self.transformers {
            if let ColumnTransformer::StandardScaler { columns, .. } = transformer {
                for column in columns {
                    if !column.mean.is_finite() || !column.scale.is_finite() {
                        problems.push(format!(
                            "scaler for '{}' has non-finite parameters",
                            column.column
                        ));
                    }
                }
            }
        }
        problems
    }
}

impl FeatureTransformer for ColumnPipeline {
    fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for transformer in &self.transformers {
            transformer.push_names(&mut names);
        }
        names
    }

    fn transform(&self, records: &[Record]) -> Result<TransformedBatch, ModelError> {
        let width = self.width();
        let mut values = Vec::with_capacity(records.len() * width);

        for (row, record) in records.iter().enumerate() {
            for transformer in &self.transformers {
                transformer.encode(row, record, &mut values)?;
            }
        }

        let produced = values.len();
        let matrix = Array2::from_shape_vec((records.len(), width), values).map_err(|_| {
            ModelError::FeatureCount {
                expected: records.len() * width,
                actual: produced,
            }
        })?;

        Ok(TransformedBatch {
            matrix,
            feature_names: self.feature_names(),
        })
    }
}

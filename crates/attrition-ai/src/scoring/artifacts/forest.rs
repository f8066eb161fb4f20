use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::tree_shap;
use crate::scoring::attribution::{AttributionOutput, POSITIVE_CLASS};
use crate::scoring::estimators::{AttributionEstimator, ModelError, ProbabilityEstimator};

/// Flat node array; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

/// `cover` is the training weight that reached the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    /// Class probabilities of the training rows that landed here.
    Leaf { cover: f64, value: Vec<f64> },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

impl DecisionTree {
    pub fn leaf_for(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value for `class`.
    pub fn expected_value(&self, class: usize) -> f64 {
        let total = self.nodes.first().map(TreeNode::cover).unwrap_or(0.0);
        if total == 0.0 {
            return 0.0;
        }

        self.nodes
            .iter()
            .filter_map(|node| match node {
                TreeNode::Leaf { cover, value } => Some(cover * value[class]),
                TreeNode::Split { .. } => None,
            })
            .sum::<f64>()
            / total
    }

    pub fn depth(&self) -> usize {
        fn depth_from(nodes: &[TreeNode], index: usize) -> usize {
            match &nodes[index] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_from(nodes, *left).max(depth_from(nodes, *right))
                }
            }
        }

        if self.nodes.is_empty() {
            0
        } else {
            depth_from(&self.nodes, 0)
        }
    }

    fn problems(&self, tree: usize, n_features: usize, n_classes: usize) -> Vec<String> {
        let mut problems = Vec::new();
        if self.nodes.is_empty() {
            problems.push(format!("tree {tree} has no nodes"));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !cover.is_finite() || cover <= 0.0 {
                problems.push(format!("tree {tree} node {index} has cover {cover}"));
            }

            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        problems.push(format!(
                            "tree {tree} node {index} splits on feature {feature} of {n_features}"
                        ));
                    }
                    if threshold.is_nan() {
                        problems.push(format!("tree {tree} node {index} has a NaN threshold"));
                    }
                    for child in [*left, *right] {
                        // Children after parents keeps the walk acyclic.
                        if child <= index || child >= self.nodes.len() {
                            problems.push(format!(
                                "tree {tree} node {index} points at invalid child {child}"
                            ));
                        }
                    }
                }
                TreeNode::Leaf { value, .. } => {
                    if value.len() != n_classes {
                        problems.push(format!(
                            "tree {tree} leaf {index} has {} values for {n_classes} classes",
                            value.len()
                        ));
                    }
                    if value.iter().any(|probability| !probability.is_finite()) {
                        problems.push(format!("tree {tree} leaf {index} has non-finite values"));
                    }
                }
            }
        }

        problems
    }
}

/// Averaged ensemble of probability trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub classes: Vec<String>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

fn default_model_type() -> String {
    "RandomForestClassifier".to_string()
}

impl RandomForest {
    /// Column of the class reported as "at risk".
    pub fn positive_index(&self) -> usize {
        if self.classes.len() > POSITIVE_CLASS {
            POSITIVE_CLASS
        } else {
            0
        }
    }

    pub fn expected_values(&self) -> Vec<f64> {
        let trees = self.trees.len().max(1) as f64;
        (0..self.classes.len())
            .map(|class| {
                self.trees
                    .iter()
                    .map(|tree| tree.expected_value(class))
                    .sum::<f64>()
                    / trees
            })
            .collect()
    }

    /// Class probabilities, `rows x classes`.
    pub fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        self.check_width(features)?;
        let mut probabilities = Array2::zeros((features.nrows(), self.classes.len()));
        let scale = 1.0 / self.trees.len().max(1) as f64;

        for (row, mut out) in features
            .axis_iter(Axis(0))
            .zip(probabilities.axis_iter_mut(Axis(0)))
        {
            for tree in &self.trees {
                for (slot, value) in out.iter_mut().zip(tree.leaf_for(row)) {
                    *slot += value * scale;
                }
            }
        }

        Ok(probabilities)
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.classes.is_empty() {
            problems.push("model declares no classes".to_string());
        }
        if self.trees.is_empty() {
            problems.push("model has no trees".to_string());
        }
        for (index, tree) in self.trees.iter().enumerate() {
            problems.extend(tree.problems(index, self.n_features, self.classes.len()));
        }
        problems
    }

    fn check_width(&self, features: ArrayView2<'_, f64>) -> Result<(), ModelError> {
        if features.ncols() != self.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                actual: features.ncols(),
            });
        }
        Ok(())
    }
}

impl ProbabilityEstimator for RandomForest {
    fn model_type(&self) -> &str {
        &self.model_type
    }

    fn predict_positive(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        let probabilities = self.predict_proba(features)?;
        Ok(probabilities.column(self.positive_index()).to_owned())
    }
}

impl AttributionEstimator for RandomForest {
    fn explain(&self, features: ArrayView2<'_, f64>) -> Result<AttributionOutput, ModelError> {
        self.check_width(features)?;
        let classes = self.classes.len();
        let mut per_class = vec![Array2::<f64>::zeros(features.dim()); classes];
        let scale = 1.0 / self.trees.len().max(1) as f64;
        let mut phi = Array2::<f64>::zeros((self.n_features, classes));

        for (row_index, row) in features.axis_iter(Axis(0)).enumerate() {
            phi.fill(0.0);
            for tree in &self.trees {
                tree_shap::accumulate(tree, row, &mut phi, scale);
            }
            for (class, matrix) in per_class.iter_mut().enumerate() {
                matrix.row_mut(row_index).assign(&phi.column(class));
            }
        }

        if classes == 1 {
            let single = per_class.pop().unwrap_or_else(|| Array2::zeros(features.dim()));
            return Ok(AttributionOutput::SingleMatrix(single));
        }
        Ok(AttributionOutput::PerClassMatrices(per_class))
    }
}

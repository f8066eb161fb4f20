//! Exact path-dependent TreeSHAP (Lundberg et al., "Consistent Individualized Feature
//! Attribution for Tree Ensembles", algorithm 2).
//!
//! Missing features follow both children weighted by node cover, so no background dataset is
//! needed. Attributions for one tree sum to `prediction - expected_value`.

use ndarray::{Array2, ArrayView1};

use super::forest::{DecisionTree, TreeNode};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// Accumulate `scale * phi` for one row into `phi` (`features x classes`).
pub(crate) fn accumulate<'a>(
    tree: &'a DecisionTree,
    row: ArrayView1<'a, f64>,
    phi: &mut Array2<f64>,
    scale: f64,
) {
    let mut walker = Walker {
        tree,
        row,
        phi,
        scale,
    };
    walker.recurse(0, Vec::with_capacity(tree.depth() + 2), 1.0, 1.0, None);
}

struct Walker<'a, 'b> {
    tree: &'a DecisionTree,
    row: ArrayView1<'a, f64>,
    phi: &'b mut Array2<f64>,
    scale: f64,
}

impl Walker<'_, '_> {
    fn recurse(
        &mut self,
        node: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend(&mut path, zero_fraction, one_fraction, feature);

        let tree = self.tree;
        match &tree.nodes[node] {
            TreeNode::Leaf { value, .. } => {
                for index in 1..path.len() {
                    let weight = unwound_sum(&path, index);
                    let element = path[index];
                    let Some(feature) = element.feature else {
                        continue;
                    };
                    let delta =
                        weight * (element.one_fraction - element.zero_fraction) * self.scale;
                    for (class, leaf_value) in value.iter().enumerate() {
                        self.phi[[feature, class]] += delta * leaf_value;
                    }
                }
            }
            TreeNode::Split {
                feature: split,
                threshold,
                left,
                right,
                cover,
            } => {
                let (hot, cold) = if self.row[*split] <= *threshold {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(index) = path
                    .iter()
                    .skip(1)
                    .position(|element| element.feature == Some(*split))
                    .map(|position| position + 1)
                {
                    incoming_zero = path[index].zero_fraction;
                    incoming_one = path[index].one_fraction;
                    unwind(&mut path, index);
                }

                let hot_fraction = tree.nodes[hot].cover() / cover;
                let cold_fraction = tree.nodes[cold].cover() / cover;

                self.recurse(
                    hot,
                    path.clone(),
                    incoming_zero * hot_fraction,
                    incoming_one,
                    Some(*split),
                );
                self.recurse(
                    cold,
                    path,
                    incoming_zero * cold_fraction,
                    0.0,
                    Some(*split),
                );
            }
        }
    }
}

fn extend(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denominator = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denominator;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denominator;
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let denominator = (depth + 1) as f64;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let previous = path[i].weight;
            path[i].weight = next_one_portion * denominator / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                previous - path[i].weight * zero_fraction * (depth - i) as f64 / denominator;
        } else {
            path[i].weight = path[i].weight * denominator / (zero_fraction * (depth - i) as f64);
        }
    }

    // Weights stay in place; identities shift down over the removed slot.
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let denominator = (depth + 1) as f64;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let share = next_one_portion * denominator / ((i + 1) as f64 * one_fraction);
            total += share;
            next_one_portion =
                path[i].weight - share * zero_fraction * (depth - i) as f64 / denominator;
        } else if zero_fraction != 0.0 {
            total += (path[i].weight / zero_fraction) / ((depth - i) as f64 / denominator);
        }
    }

    total
}

//! CART decision tree
//!
//! Used directly as the base learner of the random forest (classification)
//! and of gradient boosting (regression on residuals).

use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Splits must lower impurity by more than this
const MIN_GAIN: f64 = 1e-12;

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

impl Criterion {
    fn is_classification(&self) -> bool {
        matches!(self, Criterion::Gini | Criterion::Entropy)
    }

    fn class_impurity(&self, counts: &[usize], n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self {
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            _ => 1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
        }
    }
}

/// Variance from running sums: E[X²] - E[X]²
fn variance(sum: f64, sq_sum: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for feature sampling
    pub random_state: Option<u64>,
    n_features: usize,
    /// Class count for classification trees, 0 for regression
    n_classes: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    fn with_criterion_defaults(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Create a new classifier tree (gini)
    pub fn new_classifier() -> Self {
        Self::with_criterion_defaults(Criterion::Gini)
    }

    /// Create a new regressor tree (squared error)
    pub fn new_regressor() -> Self {
        Self::with_criterion_defaults(Criterion::MSE)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fix the number of classes; a bootstrap sample may miss some of them
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Fit the tree to all rows
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_rows(x, y, &indices)
    }

    /// Fit the tree to the given rows (repeats allowed, as in a bootstrap)
    pub fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(TrainerError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if rows.is_empty() {
            return Err(TrainerError::InsufficientData("no rows to fit a tree on".to_string()));
        }

        if self.criterion.is_classification() {
            let max_label = rows.iter().map(|&i| y[i]).fold(0.0f64, f64::max);
            if rows.iter().any(|&i| y[i] < 0.0 || y[i].fract() != 0.0) {
                return Err(TrainerError::Training(
                    "classification tree labels must be class indices".to_string(),
                ));
            }
            self.n_classes = self.n_classes.max(max_label as usize + 1);
        }

        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        self.root = Some(self.build(x, y, rows, 0, &mut rng));
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(TrainerError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.outer_iter().map(|row| root.predict_row(row)).collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Depth of the fitted tree (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    fn build(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let n_samples = rows.len();
        let impurity = self.node_impurity(y, rows);
        let leaf = || TreeNode::Leaf {
            value: self.leaf_value(y, rows),
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= MIN_GAIN;
        if should_stop {
            return leaf();
        }

        let candidates = self.candidate_features(rng);
        let Some((feature_idx, threshold)) = self.best_split(x, y, rows, &candidates, impurity) else {
            return leaf();
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&i| x[[i, feature_idx]] <= threshold);

        let left = Box::new(self.build(x, y, &left_rows, depth + 1, rng));
        let right = Box::new(self.build(x, y, &right_rows, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(m) if m < self.n_features => {
                let mut picked = index::sample(rng, self.n_features, m).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best (feature, threshold) over the candidates; ties keep the earliest feature
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        candidates: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64)> {
        let per_feature: Vec<Option<(f64, f64)>> = candidates
            .par_iter()
            .map(|&feature_idx| self.best_threshold(x, y, rows, feature_idx, parent_impurity))
            .collect();

        let mut best: Option<(usize, f64, f64)> = None;
        for (&feature_idx, found) in candidates.iter().zip(per_feature) {
            if let Some((threshold, gain)) = found {
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }
        best.map(|(f, t, _)| (f, t))
    }

    /// Sweep the rows sorted by one feature, moving them left one at a time
    fn best_threshold(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<(f64, f64)> {
        let mut sorted: Vec<(f64, f64)> = rows.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let min_leaf = self.min_samples_leaf;
        let mut best_gain = MIN_GAIN;
        let mut best_threshold = None;

        let mut consider = |pos: usize, weighted: f64, best_gain: &mut f64| {
            let gain = parent_impurity - weighted;
            if gain > *best_gain {
                *best_gain = gain;
                best_threshold = Some((sorted[pos].0 + sorted[pos + 1].0) / 2.0);
            }
        };

        if self.criterion.is_classification() {
            let mut left = vec![0usize; self.n_classes];
            let mut right = vec![0usize; self.n_classes];
            for &(_, label) in &sorted {
                right[label as usize] += 1;
            }

            for pos in 0..n - 1 {
                let label = sorted[pos].1 as usize;
                left[label] += 1;
                right[label] -= 1;

                let n_left = pos + 1;
                let n_right = n - n_left;
                if sorted[pos].0 >= sorted[pos + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let weighted = (n_left as f64 * self.criterion.class_impurity(&left, n_left)
                    + n_right as f64 * self.criterion.class_impurity(&right, n_right))
                    / n as f64;
                consider(pos, weighted, &mut best_gain);
            }
        } else {
            let (mut right_sum, mut right_sq) = sorted
                .iter()
                .fold((0.0, 0.0), |(s, q), &(_, v)| (s + v, q + v * v));
            let (mut left_sum, mut left_sq) = (0.0, 0.0);

            for pos in 0..n - 1 {
                let v = sorted[pos].1;
                left_sum += v;
                left_sq += v * v;
                right_sum -= v;
                right_sq -= v * v;

                let n_left = pos + 1;
                let n_right = n - n_left;
                if sorted[pos].0 >= sorted[pos + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let weighted = (n_left as f64 * variance(left_sum, left_sq, n_left)
                    + n_right as f64 * variance(right_sum, right_sq, n_right))
                    / n as f64;
                consider(pos, weighted, &mut best_gain);
            }
        }

        best_threshold.map(|t| (t, best_gain))
    }

    fn class_counts(&self, y: &Array1<f64>, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in rows {
            counts[y[i] as usize] += 1;
        }
        counts
    }

    fn node_impurity(&self, y: &Array1<f64>, rows: &[usize]) -> f64 {
        if self.criterion.is_classification() {
            self.criterion.class_impurity(&self.class_counts(y, rows), rows.len())
        } else {
            let (sum, sq) = rows.iter().fold((0.0, 0.0), |(s, q), &i| (s + y[i], q + y[i] * y[i]));
            variance(sum, sq, rows.len())
        }
    }

    /// Majority class (lowest index on ties) or mean target
    fn leaf_value(&self, y: &Array1<f64>, rows: &[usize]) -> f64 {
        if self.criterion.is_classification() {
            let counts = self.class_counts(y, rows);
            let mut best = 0;
            for (cls, &c) in counts.iter().enumerate() {
                if c > counts[best] {
                    best = cls;
                }
            }
            best as f64
        } else if rows.is_empty() {
            0.0
        } else {
            rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_fits_training_data() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0], [5.0, 0.0], [6.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_threshold_is_midpoint() {
        let x = array![[1.0], [2.0], [10.0], [11.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        match tree.root().unwrap() {
            TreeNode::Split { threshold, feature_idx, .. } => {
                assert_eq!(*feature_idx, 0);
                assert_eq!(*threshold, 6.0);
            }
            other => panic!("expected a split, got {:?}", other),
        }
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_max_depth() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(32, |i| (i % 2) as f64);

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_regressor_leaf_means() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let y = array![1.0, 3.0, 10.0, 12.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[0.5], [10.5]]).unwrap(), array![2.0, 11.0]);
    }

    #[test]
    fn test_duplicate_feature_values_never_split_between_equals() {
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        // tie between classes goes to the lower index
        assert_eq!(tree.predict(&array![[1.0]]).unwrap(), array![0.0]);
    }

    #[test]
    fn test_fit_rows_subset() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_n_classes(2);
        tree.fit_rows(&x, &y, &[0, 0, 1]).unwrap();
        assert_eq!(tree.predict(&array![[3.0]]).unwrap(), array![0.0]);
    }

    #[test]
    fn test_unfitted_predict() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(TrainerError::ModelNotFitted)));
    }
}

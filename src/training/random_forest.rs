//! Random Forest classifier

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::{Criterion, DecisionTree};
use super::models::{argmax, check_n_features, training_classes, Classifier};
use crate::error::{Result, TrainerError};

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// All features
    All,
}

/// Bagged ensemble of gini trees with majority voting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
    classes: Vec<f64>,
    n_classes: usize,
    n_features: usize,
    is_fitted: bool,
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            classes: Vec::new(),
            n_classes: 0,
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Vote counts per class index, one row per sample
    fn votes(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut votes = Array2::zeros((x.nrows(), self.n_classes));
        for predictions in &per_tree {
            for (row, &cls) in predictions.iter().enumerate() {
                votes[[row, cls as usize]] += 1.0;
            }
        }
        Ok(votes)
    }

    /// Fraction of trees voting for each class index
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n_trees = self.trees.len().max(1) as f64;
        Ok(self.votes(x)? / n_trees)
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let classes = training_classes(x, y)?;
        let n_classes = classes.iter().fold(0.0f64, |a, &b| a.max(b)) as usize + 1;

        let n_samples = x.nrows();
        let max_features = self.compute_max_features(x.ncols());
        let base_seed = self.random_state.unwrap_or(42);

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let rows: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new_classifier()
                    .with_criterion(self.criterion)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(seed)
                    .with_n_classes(n_classes);
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit_rows(x, y, &rows)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.classes = classes;
        self.n_classes = n_classes;
        self.n_features = x.ncols();
        self.is_fitted = true;
        Ok(())
    }

    /// Majority vote; ties go to the lowest class index
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let votes = self.votes(x)?;
        Ok(votes
            .rows()
            .into_iter()
            .map(|row| argmax(row.iter().copied()) as f64)
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let base = if i < n / 2 { 0.0 } else { 5.0 };
            base + ((i * 7 + j * 3) % 10) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(n, |i| if i < n / 2 { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_forest_separates_clusters() {
        let (x, y) = two_clusters(40);
        let mut forest = RandomForestClassifier::new(20).with_random_state(7);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.trees().len(), 20);
        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = two_clusters(30);
        let mut a = RandomForestClassifier::new(10).with_random_state(3);
        let mut b = RandomForestClassifier::new(10).with_random_state(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let (x, y) = two_clusters(20);
        let mut forest = RandomForestClassifier::new(5).with_random_state(1);
        forest.fit(&x, &y).unwrap();

        for row in forest.predict_proba(&x).unwrap().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_max_features() {
        let forest = RandomForestClassifier::new(1);
        assert_eq!(forest.compute_max_features(10), 4);
        assert_eq!(forest.compute_max_features(1), 1);
        let forest = forest.with_max_features(MaxFeatures::All);
        assert_eq!(forest.compute_max_features(10), 10);
    }
}

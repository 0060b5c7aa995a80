//! Gradient Boosting implementation
//!
//! Boosted regression trees fitted to log-loss residuals. Binary problems
//! boost a single log-odds score; with more than two classes one score is
//! boosted per class one-vs-rest and the highest probability wins.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{argmax, check_n_features, training_classes, Classifier};
use crate::error::{Result, TrainerError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// One boosted log-odds score
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoostedScore {
    initial_log_odds: f64,
    trees: Vec<DecisionTree>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    scores: Vec<BoostedScore>,
    classes: Vec<f64>,
    n_features: usize,
    is_fitted: bool,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            scores: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Number of trees across all boosted scores
    pub fn n_trees(&self) -> usize {
        self.scores.iter().map(|s| s.trees.len()).sum()
    }

    /// Boost one log-odds score against a 0/1 target
    fn fit_score(&self, x: &Array2<f64>, target: &Array1<f64>, rng: &mut Xoshiro256PlusPlus) -> Result<BoostedScore> {
        let n_samples = x.nrows();

        let p = target.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        let initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, initial_log_odds);
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            // Negative gradient of the log loss
            let residuals: Array1<f64> = target
                .iter()
                .zip(log_odds.iter())
                .map(|(&yi, &lo)| yi - sigmoid(lo))
                .collect();

            let rows = self.subsample_indices(n_samples, rng);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_rows(x, &residuals, &rows)?;

            let update = tree.predict(x)?;
            log_odds.scaled_add(self.config.learning_rate, &update);
            trees.push(tree);
        }

        Ok(BoostedScore {
            initial_log_odds,
            trees,
        })
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = (((n as f64) * self.config.subsample).ceil() as usize).max(1);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    fn log_odds(&self, score: &BoostedScore, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut log_odds = Array1::from_elem(x.nrows(), score.initial_log_odds);
        for tree in &score.trees {
            log_odds.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(log_odds)
    }

    /// Probability of each class per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let n = x.nrows();
        if let [score] = self.scores.as_slice() {
            let p = self.log_odds(score, x)?.mapv(sigmoid);
            let mut proba = Array2::zeros((n, 2));
            proba.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
            proba.column_mut(1).assign(&p);
            return Ok(proba);
        }

        let mut proba = Array2::zeros((n, self.scores.len()));
        for (k, score) in self.scores.iter().enumerate() {
            proba.column_mut(k).assign(&self.log_odds(score, x)?.mapv(sigmoid));
        }
        for mut row in proba.rows_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            }
        }
        Ok(proba)
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(TrainerError::Config(format!(
                "subsample must be in (0, 1], got {}",
                self.config.subsample
            )));
        }
        let classes = training_classes(x, y)?;

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let positives: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let mut scores = Vec::with_capacity(positives.len());
        for cls in positives {
            let target = y.mapv(|v| if v.round() == cls { 1.0 } else { 0.0 });
            scores.push(self.fit_score(x, &target, &mut rng)?);
        }

        self.scores = scores;
        self.classes = classes;
        self.n_features = x.ncols();
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row.iter().copied())])
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

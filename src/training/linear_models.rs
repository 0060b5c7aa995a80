//! Linear classification models

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::models::{argmax, check_n_features, training_classes, Classifier};
use crate::error::{Result, TrainerError};

/// Weights of one fitted sigmoid unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinaryLogit {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl BinaryLogit {
    fn linear(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }
}

/// Logistic regression
///
/// Binary problems fit a single sigmoid unit for the larger class index;
/// with more than two classes one unit per class is fitted one-vs-rest and
/// the highest score wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    classes: Vec<f64>,
    units: Vec<BinaryLogit>,
    n_features: usize,
    is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            classes: Vec::new(),
            units: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Batch gradient descent on the L2-regularized log loss; `y` is 0/1
    fn fit_unit(&self, x: &Array2<f64>, y: &Array1<f64>) -> BinaryLogit {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        BinaryLogit {
            coefficients: weights,
            intercept: bias,
        }
    }

    /// Probability of each class per row (binary problems: of `classes[1]`)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let n = x.nrows();
        if let [unit] = self.units.as_slice() {
            let p = Self::sigmoid(&unit.linear(x));
            let mut proba = Array2::zeros((n, 2));
            proba.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
            proba.column_mut(1).assign(&p);
            return Ok(proba);
        }

        let mut proba = Array2::zeros((n, self.units.len()));
        for (k, unit) in self.units.iter().enumerate() {
            proba.column_mut(k).assign(&Self::sigmoid(&unit.linear(x)));
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

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let classes = training_classes(x, y)?;

        self.units = if classes.len() == 2 {
            let positive = classes[1];
            let target = y.mapv(|v| if v.round() == positive { 1.0 } else { 0.0 });
            vec![self.fit_unit(x, &target)]
        } else {
            classes
                .iter()
                .map(|&cls| {
                    let target = y.mapv(|v| if v.round() == cls { 1.0 } else { 0.0 });
                    self.fit_unit(x, &target)
                })
                .collect()
        };

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

//! Support Vector Machine classifier
//!
//! Kernel SVM trained with simplified SMO (Sequential Minimal Optimization).
//! Multi-class problems train one machine per class (One-vs-Rest).

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{argmax, check_n_features, training_classes, Classifier};
use crate::error::{Result, TrainerError};

/// Maximum number of samples for eager kernel matrix computation
/// (a 5 000 × 5 000 matrix is 200 MB). Larger inputs are a training error.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 5_000;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, coef0: f64 },
    /// K(x, y) = exp(-γ * ||x - y||²)
    Rbf,
    /// K(x, y) = tanh(γ * x · y + r)
    Sigmoid { coef0: f64 },
}

/// Kernel coefficient γ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// `1 / (n_features * var(X))`, computed from the training matrix
    Scale,
    Value(f64),
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub kernel: KernelType,
    pub gamma: Gamma,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of SMO sweeps
    pub max_iter: usize,
    /// Seed for the second-index choice in SMO
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::Rbf,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

fn kernel(kind: &KernelType, gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    match kind {
        KernelType::Linear => a.dot(&b),
        KernelType::Polynomial { degree, coef0 } => (gamma * a.dot(&b) + coef0).powi(*degree as i32),
        KernelType::Rbf => {
            let norm_sq: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum();
            (-gamma * norm_sq).exp()
        }
        KernelType::Sigmoid { coef0 } => (gamma * a.dot(&b) + coef0).tanh(),
    }
}

/// One fitted binary machine: `f(x) = Σ coef_i K(sv_i, x) + bias`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySVM {
    support_vectors: Array2<f64>,
    /// alpha_i * y_i for each support vector
    dual_coef: Array1<f64>,
    bias: f64,
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    /// γ resolved at fit time
    gamma: f64,
    classes: Vec<f64>,
    /// One machine for binary problems, one per class otherwise
    machines: Vec<BinarySVM>,
    n_features: usize,
    is_fitted: bool,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            gamma: 1.0,
            classes: Vec::new(),
            machines: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    fn resolve_gamma(&self, x: &Array2<f64>) -> f64 {
        match self.config.gamma {
            Gamma::Value(g) => g,
            Gamma::Scale => {
                let var = x.var(0.0);
                let denom = x.ncols() as f64 * var;
                if denom > 0.0 && denom.is_finite() {
                    1.0 / denom
                } else {
                    1.0
                }
            }
        }
    }

    fn fit_machine(&self, x: &Array2<f64>, kernel_matrix: &Array2<f64>, y_signed: &Array1<f64>) -> BinarySVM {
        let (alphas, bias) = self.smo_train(kernel_matrix, y_signed);

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = alphas[idx] * y_signed[idx];
        }

        BinarySVM {
            support_vectors,
            dual_coef,
            bias,
        }
    }

    /// Simplified SMO over a precomputed kernel matrix; `y` is ±1
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        if n <= 1 {
            return (alphas, bias);
        }

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                if alphas[i] != 0.0 {
                    sum += alphas[i] * y[i] * k[[i, idx]];
                }
            }
            sum
        };

        let max_passes = 5;
        let mut passes = 0;
        let mut sweeps = 0;

        while passes < max_passes && sweeps < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];

                let violates_kkt = (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0);
                if !violates_kkt {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).max(l).min(h);
                if (alpha_j - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);
                alphas[i] = alpha_i;
                alphas[j] = alpha_j;

                let b1 = bias
                    - e_i
                    - y[i] * (alpha_i - alpha_i_old) * k[[i, i]]
                    - y[j] * (alpha_j - alpha_j_old) * k[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alpha_i - alpha_i_old) * k[[i, j]]
                    - y[j] * (alpha_j - alpha_j_old) * k[[j, j]];

                bias = if alpha_i > 0.0 && alpha_i < c {
                    b1
                } else if alpha_j > 0.0 && alpha_j < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }

            sweeps += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Kernel matrix, rows filled in place in parallel
    fn kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let kind = &self.config.kernel;
        let gamma = self.gamma;

        let mut k = Array2::zeros((n, n));
        k.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                let xi = x.row(i);
                for (j, cell) in row.iter_mut().enumerate() {
                    *cell = kernel(kind, gamma, xi, x.row(j));
                }
            });
        k
    }

    /// Decision values, one column per machine
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let kind = &self.config.kernel;
        let gamma = self.gamma;
        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                self.machines
                    .iter()
                    .map(|m| {
                        m.support_vectors
                            .outer_iter()
                            .zip(m.dual_coef.iter())
                            .map(|(sv, coef)| coef * kernel(kind, gamma, sv, sample))
                            .sum::<f64>()
                            + m.bias
                    })
                    .collect()
            })
            .collect();

        let mut scores = Array2::zeros((x.nrows(), self.machines.len()));
        for (i, row) in rows.into_iter().enumerate() {
            for (m, val) in row.into_iter().enumerate() {
                scores[[i, m]] = val;
            }
        }
        Ok(scores)
    }

    /// Number of support vectors per machine
    pub fn n_support(&self) -> Vec<usize> {
        self.machines.iter().map(|m| m.support_vectors.nrows()).collect()
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let classes = training_classes(x, y)?;

        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(TrainerError::Training(format!(
                "{} training rows exceed the SVM kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        self.gamma = self.resolve_gamma(x);
        let k = self.kernel_matrix(x);

        let positives: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };
        self.machines = positives
            .iter()
            .map(|&cls| {
                let y_signed = y.mapv(|v| if v.round() == cls { 1.0 } else { -1.0 });
                self.fit_machine(x, &k, &y_signed)
            })
            .collect();

        self.classes = classes;
        self.n_features = x.ncols();
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        let binary = self.machines.len() == 1;

        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                if binary {
                    if row[0] >= 0.0 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                } else {
                    self.classes[argmax(row.iter().copied())]
                }
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

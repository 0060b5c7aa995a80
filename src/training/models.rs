//! Classifier trait and the fixed model menu

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForestClassifier;
use super::svm::{SVMClassifier, SVMConfig};
use crate::error::{Result, TrainerError};

/// Trait for classifiers trained on class-index labels.
///
/// `y` holds class indices (`0.0`, `1.0`, ...) and `predict` returns values
/// from the same set.
pub trait Classifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict a class index per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// Classifier choices offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    LogisticRegression,
    SupportVectorClassifier,
    RandomForest,
    GradientBoostedTrees,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::LogisticRegression,
        ModelKind::SupportVectorClassifier,
        ModelKind::RandomForest,
        ModelKind::GradientBoostedTrees,
    ];

    /// Identifier used on the command line and in artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic-regression",
            ModelKind::SupportVectorClassifier => "support-vector-classifier",
            ModelKind::RandomForest => "random-forest",
            ModelKind::GradientBoostedTrees => "gradient-boosted-trees",
        }
    }

    /// Menu label
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::SupportVectorClassifier => "Support Vector Classifier",
            ModelKind::RandomForest => "Random Forest Classifier",
            ModelKind::GradientBoostedTrees => "Gradient Boosted Trees",
        }
    }

    /// Build an unfitted model with default hyperparameters.
    ///
    /// `random_state` seeds the models that sample (SVM pair selection,
    /// forest bootstraps, boosting subsamples).
    pub fn build(&self, random_state: u64) -> TrainedModel {
        match self {
            ModelKind::LogisticRegression => TrainedModel::LogisticRegression(LogisticRegression::new()),
            ModelKind::SupportVectorClassifier => TrainedModel::SupportVectorClassifier(SVMClassifier::new(SVMConfig {
                random_state: Some(random_state),
                ..SVMConfig::default()
            })),
            ModelKind::RandomForest => TrainedModel::RandomForest(
                RandomForestClassifier::new(100).with_random_state(random_state),
            ),
            ModelKind::GradientBoostedTrees => {
                TrainedModel::GradientBoostedTrees(GradientBoostingClassifier::new(GradientBoostingConfig {
                    random_state: Some(random_state),
                    ..GradientBoostingConfig::default()
                }))
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "logistic-regression" | "logistic" | "lr" => Ok(ModelKind::LogisticRegression),
            "support-vector-classifier" | "svc" | "svm" => Ok(ModelKind::SupportVectorClassifier),
            "random-forest" | "rf" => Ok(ModelKind::RandomForest),
            "gradient-boosted-trees" | "gradient-boosting" | "gbt" | "xgboost" => {
                Ok(ModelKind::GradientBoostedTrees)
            }
            other => Err(TrainerError::Config(format!(
                "unknown model '{}' (expected one of: {})",
                other,
                ModelKind::ALL.map(|k| k.as_str()).join(", ")
            ))),
        }
    }
}

/// A classifier of any kind on the menu, serializable as a whole
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    SupportVectorClassifier(SVMClassifier),
    RandomForest(RandomForestClassifier),
    GradientBoostedTrees(GradientBoostingClassifier),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::SupportVectorClassifier(_) => ModelKind::SupportVectorClassifier,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoostedTrees(_) => ModelKind::GradientBoostedTrees,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::SupportVectorClassifier(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoostedTrees(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::SupportVectorClassifier(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoostedTrees(m) => m,
        }
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Check `x`/`y` agree and return the sorted distinct class indices.
///
/// Labels must be non-negative integers and at least two classes must be
/// present.
pub(crate) fn training_classes(x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<f64>> {
    if x.nrows() != y.len() {
        return Err(TrainerError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(TrainerError::InsufficientData("no training rows".to_string()));
    }
    if let Some((i, &v)) = y
        .iter()
        .enumerate()
        .find(|(_, &v)| v < 0.0 || (v - v.round()).abs() > 1e-9)
    {
        return Err(TrainerError::Training(format!(
            "class labels must be class indices, but sample {} has label {}",
            i, v
        )));
    }

    let mut classes: Vec<f64> = y.iter().map(|v| v.round()).collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();

    if classes.len() < 2 {
        return Err(TrainerError::Training(format!(
            "at least 2 distinct classes are required in the training partition, found {}",
            classes.len()
        )));
    }
    Ok(classes)
}

/// Check a prediction matrix has the fitted number of columns
pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(TrainerError::Shape {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Index of the largest score; ties go to the lowest index
pub(crate) fn argmax(scores: impl IntoIterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, s) in scores.into_iter().enumerate() {
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}

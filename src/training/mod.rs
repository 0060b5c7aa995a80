//! Model training module
//!
//! Provides the four classifiers offered by the pipeline:
//! - Logistic Regression
//! - Support Vector Classifier (RBF kernel)
//! - Random Forest
//! - Gradient Boosted Trees
//!
//! plus the [`Trainer`] that fits them and the [`ArtifactStore`] that
//! persists them.

mod artifact;
mod models;
mod trainer;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use artifact::{validate_artifact_name, ArtifactStore, ModelArtifact, ARTIFACT_EXTENSION};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::LogisticRegression;
pub use models::{Classifier, ModelKind, TrainedModel};
pub use random_forest::{MaxFeatures, RandomForestClassifier};
pub use svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
pub use trainer::Trainer;

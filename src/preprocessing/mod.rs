//! Data preprocessing module
//!
//! Turns a loaded table into train/test feature matrices and label vectors:
//! - Seeded train/test partitioning
//! - Missing value imputation (mean / most frequent)
//! - Feature scaling (standard, min-max)
//! - One-hot encoding of categorical features, label encoding of the target

mod encoder;
mod imputer;
mod preprocessor;
mod scaler;
mod split;

pub use encoder::{LabelEncoder, OneHotEncoder};
pub use imputer::{ImputeStrategy, Imputer};
pub use preprocessor::{PreparedData, Preprocessor};
pub use scaler::{Scaler, ScalerKind, ScalerParams};
pub use split::{TrainTestSplit, TrainTestSplitter};

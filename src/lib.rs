//! AutoMate ML - no-code tabular classifier training
//!
//! This crate runs one fixed pipeline over a user-supplied table:
//! Load → Preprocess → Train → Evaluate, persisting the fitted model as a
//! named artifact and reporting test-set accuracy.
//!
//! # Modules
//!
//! - [`data`] - Delimited and spreadsheet loading, dataset catalog
//! - [`preprocessing`] - Train/test split, imputation, encoding, scaling
//! - [`training`] - The four classifiers, trainer and artifact store
//! - [`evaluation`] - Test-partition accuracy
//! - [`pipeline`] - End-to-end run over all stages
//! - [`config`] - Directories and split settings
//! - [`cli`] - Command-line interface and interactive wizard
//!
//! # Example
//!
//! ```no_run
//! use automate_ml::prelude::*;
//!
//! let pipeline = TrainingPipeline::new(PipelineConfig::default());
//! let report = pipeline.run(&TrainRequest {
//!     source: DataSource::path("data/iris.csv"),
//!     format: None,
//!     target_column: "species".to_string(),
//!     scaler: ScalerKind::Standard,
//!     model: ModelKind::RandomForest,
//!     artifact_name: "iris".to_string(),
//! })?;
//! println!("{}", report.success_message());
//! # Ok::<(), automate_ml::error::TrainerError>(())
//! ```

pub mod error;
pub mod config;

pub mod data;
pub mod preprocessing;
pub mod training;
pub mod evaluation;
pub mod pipeline;

pub mod cli;

pub use error::{Result, TrainerError};

/// Commonly used types
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::data::{DataFormat, DataLoader, DataSource, DatasetCatalog};
    pub use crate::error::{Result, TrainerError};
    pub use crate::evaluation::{EvaluationReport, Evaluator};
    pub use crate::pipeline::{TrainReport, TrainRequest, TrainingPipeline};
    pub use crate::preprocessing::{PreparedData, Preprocessor, ScalerKind};
    pub use crate::training::{ArtifactStore, Classifier, ModelArtifact, ModelKind, TrainedModel, Trainer};
}

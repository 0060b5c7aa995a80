//! End-to-end training run
//!
//! Load → Preprocess → Train (and persist) → Evaluate. The stages run in
//! order on the calling thread and the first failure aborts the run with
//! that stage's error; no partial report is produced.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::data::{DataFormat, DataLoader, DataSource};
use crate::error::Result;
use crate::evaluation::{EvaluationReport, Evaluator};
use crate::preprocessing::{Preprocessor, ScalerKind};
use crate::training::{ModelKind, Trainer};

/// Parameters of one training run
#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub source: DataSource,
    /// Declared format; inferred from the file name when `None`
    pub format: Option<DataFormat>,
    pub target_column: String,
    pub scaler: ScalerKind,
    pub model: ModelKind,
    pub artifact_name: String,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub artifact_name: String,
    pub artifact_path: PathBuf,
    pub model: ModelKind,
    pub scaler: ScalerKind,
    pub evaluation: EvaluationReport,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub classes: Vec<String>,
    pub elapsed: Duration,
}

impl TrainReport {
    pub fn accuracy(&self) -> f64 {
        self.evaluation.accuracy
    }

    pub fn success_message(&self) -> String {
        self.evaluation.success_message()
    }
}

/// Runs the whole pipeline with one configuration.
///
/// Each call to [`TrainingPipeline::run`] works on its own table and
/// partitions; only the models directory is shared between runs.
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
    loader: DataLoader,
    preprocessor: Preprocessor,
    trainer: Trainer,
    evaluator: Evaluator,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            loader: DataLoader::new(),
            preprocessor: Preprocessor::from_config(&config),
            trainer: Trainer::from_config(&config),
            evaluator: Evaluator::new(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }

    pub fn run(&self, request: &TrainRequest) -> Result<TrainReport> {
        self.config.validate()?;
        let format = match request.format {
            Some(format) => format,
            None => request.source.infer_format()?,
        };
        let df = self.loader.load(request.source.clone(), format)?;
        self.run_on_table(
            &df,
            &request.target_column,
            request.scaler,
            request.model,
            &request.artifact_name,
        )
    }

    /// Run every stage after loading on an in-memory table
    pub fn run_on_table(
        &self,
        df: &DataFrame,
        target_column: &str,
        scaler: ScalerKind,
        model: ModelKind,
        artifact_name: &str,
    ) -> Result<TrainReport> {
        let start = Instant::now();

        let data = self.preprocessor.prepare(df, target_column, scaler)?;
        let (artifact, artifact_path) = self.trainer.train(artifact_name, model, target_column, &data)?;
        let evaluation = self.evaluator.evaluate(&artifact.model, &data.x_test, &data.y_test)?;

        let elapsed = start.elapsed();
        info!(
            artifact = %artifact_name,
            model = %model,
            accuracy = evaluation.accuracy,
            elapsed_ms = elapsed.as_millis() as u64,
            "Training run complete"
        );

        Ok(TrainReport {
            artifact_name: artifact.name,
            artifact_path,
            model,
            scaler,
            evaluation,
            n_train: data.n_train(),
            n_test: data.n_test(),
            n_features: data.feature_names.len(),
            classes: data.classes,
            elapsed,
        })
    }
}

//! Fit a menu classifier and persist it

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info};

use super::artifact::{validate_artifact_name, ArtifactStore, ModelArtifact};
use super::models::{Classifier, ModelKind};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::preprocessing::PreparedData;

/// Fits classifiers with default hyperparameters and saves them to an
/// [`ArtifactStore`]
#[derive(Debug, Clone)]
pub struct Trainer {
    store: ArtifactStore,
    random_state: u64,
}

impl Trainer {
    pub fn new(store: ArtifactStore, random_state: u64) -> Self {
        Self { store, random_state }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(ArtifactStore::new(config.models_dir.clone()), config.random_state)
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Fit `kind` on the train partition of `data` and save it as `name`.
    ///
    /// The name is checked before any fitting starts. An existing artifact
    /// with the same name is replaced.
    pub fn train(
        &self,
        name: &str,
        kind: ModelKind,
        target_column: &str,
        data: &PreparedData,
    ) -> Result<(ModelArtifact, PathBuf)> {
        validate_artifact_name(name)?;

        let mut model = kind.build(self.random_state);
        info!(
            model = %kind,
            n_samples = data.x_train.nrows(),
            n_features = data.x_train.ncols(),
            "Fitting classifier"
        );

        let start = Instant::now();
        model.fit(&data.x_train, &data.y_train)?;
        let fit_secs = start.elapsed().as_secs_f64();
        debug!(model = %kind, fit_secs, "Classifier fitted");

        let artifact = ModelArtifact::new(
            name,
            data.scaler.kind(),
            target_column,
            data.feature_names.clone(),
            data.classes.clone(),
            model,
        );
        let path = self.store.save(&artifact)?;
        Ok((artifact, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrainerError;
    use crate::preprocessing::{Preprocessor, ScalerKind};
    use polars::prelude::*;
    use tempfile::TempDir;

    fn prepared() -> PreparedData {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<&str> = (0..30).map(|i| if i < 15 { "a" } else { "b" }).collect();
        let df = df!("x" => x, "y" => y).unwrap();
        Preprocessor::default()
            .prepare(&df, "y", ScalerKind::Standard)
            .unwrap()
    }

    #[test]
    fn test_train_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let trainer = Trainer::new(ArtifactStore::new(dir.path()), 42);
        let data = prepared();

        let (artifact, path) = trainer
            .train("t1", ModelKind::LogisticRegression, "y", &data)
            .unwrap();

        assert_eq!(path, dir.path().join("t1.json"));
        assert!(path.is_file());
        assert_eq!(artifact.classes, vec!["a", "b"]);
        assert_eq!(artifact.scaler_kind, ScalerKind::Standard);
        assert!(artifact.model.is_fitted());
    }

    #[test]
    fn test_invalid_name_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let trainer = Trainer::new(ArtifactStore::new(dir.path()), 42);
        let data = prepared();

        for bad in ["", "../escape"] {
            let result = trainer.train(bad, ModelKind::RandomForest, "y", &data);
            assert!(matches!(result, Err(TrainerError::EmptyName(_))));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

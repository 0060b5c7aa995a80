//! Persisted model artifacts
//!
//! A trained classifier is written as one JSON file at
//! `<models_dir>/<name>.json`. Writes go through a temporary file in the
//! same directory followed by a rename, so a failed save never leaves a
//! partial artifact behind. Saving under an existing name replaces the
//! previous artifact (last write wins).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::models::{Classifier, ModelKind, TrainedModel};
use crate::error::{Result, TrainerError};
use crate::preprocessing::ScalerKind;

/// File extension of persisted artifacts
pub const ARTIFACT_EXTENSION: &str = "json";

/// A fitted classifier together with what is needed to interpret it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Artifact name, also the file stem
    pub name: String,
    pub model_kind: ModelKind,
    /// Scaler the features were prepared with
    pub scaler_kind: ScalerKind,
    pub target_column: String,
    /// Feature columns in matrix order
    pub feature_names: Vec<String>,
    /// Original class labels; class index `i` decodes to `classes[i]`
    pub classes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(
        name: impl Into<String>,
        scaler_kind: ScalerKind,
        target_column: impl Into<String>,
        feature_names: Vec<String>,
        classes: Vec<String>,
        model: TrainedModel,
    ) -> Self {
        Self {
            name: name.into(),
            model_kind: model.kind(),
            scaler_kind,
            target_column: target_column.into(),
            feature_names,
            classes,
            created_at: Utc::now(),
            model,
        }
    }

    /// Predict class indices for prepared feature rows
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict(x)
    }

    /// Predict and decode to the original class labels
    pub fn predict_labels(&self, x: &Array2<f64>) -> Result<Vec<String>> {
        self.predict(x)?
            .iter()
            .map(|&idx| {
                self.classes.get(idx as usize).cloned().ok_or_else(|| {
                    TrainerError::Training(format!("predicted class index {} has no label", idx))
                })
            })
            .collect()
    }
}

/// Reject names that are empty or could escape the models directory
pub fn validate_artifact_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(TrainerError::EmptyName(name.to_string()));
    }
    Ok(())
}

/// Directory of persisted artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    models_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Deterministic location of the artifact called `name`
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_artifact_name(name)?;
        Ok(self.models_dir.join(format!("{}.{}", name, ARTIFACT_EXTENSION)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Write the artifact atomically and return its path
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.path_for(&artifact.name)?;

        // NaN and infinite parameters serialize as `null` and would not load back
        let bytes = serde_json::to_vec(artifact)?;
        serde_json::from_slice::<ModelArtifact>(&bytes).map_err(|e| {
            TrainerError::Serialization(format!(
                "artifact '{}' has non-finite parameters: {}",
                artifact.name, e
            ))
        })?;

        fs::create_dir_all(&self.models_dir).map_err(|e| {
            TrainerError::Serialization(format!(
                "failed to create models directory {}: {}",
                self.models_dir.display(),
                e
            ))
        })?;

        let tmp = NamedTempFile::new_in(&self.models_dir).map_err(|e| {
            TrainerError::Serialization(format!("failed to create temporary file: {}", e))
        })?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            writer
                .write_all(&bytes)
                .and_then(|_| writer.flush())
                .map_err(|e| TrainerError::Serialization(format!("failed to write artifact: {}", e)))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| TrainerError::Serialization(format!("failed to sync artifact: {}", e)))?;

        // Dropping the temp file on any error above removes it
        tmp.persist(&path).map_err(|e| {
            TrainerError::Serialization(format!("failed to persist {}: {}", path.display(), e.error))
        })?;

        info!(artifact = %artifact.name, path = %path.display(), "Saved model artifact");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<ModelArtifact> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(TrainerError::ModelNotFound(name.to_string()));
        }
        let file = File::open(&path)?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))?;
        debug!(artifact = %name, kind = %artifact.model_kind, "Loaded model artifact");
        Ok(artifact)
    }

    /// Raw artifact bytes, as offered for download
    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(TrainerError::ModelNotFound(name.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Copy an artifact to `dest`; a directory destination keeps the file name
    pub fn export_to(&self, name: &str, dest: &Path) -> Result<PathBuf> {
        let bytes = self.read_bytes(name)?;
        let target = if dest.is_dir() {
            dest.join(format!("{}.{}", name, ARTIFACT_EXTENSION))
        } else {
            dest.to_path_buf()
        };
        fs::write(&target, bytes)?;
        Ok(target)
    }

    /// Names of stored artifacts, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn fitted_artifact(name: &str) -> ModelArtifact {
        let x = array![[-2.0], [-1.0], [1.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = ModelKind::LogisticRegression.build(42);
        model.fit(&x, &y).unwrap();
        ModelArtifact::new(
            name,
            ScalerKind::Standard,
            "label",
            vec!["x".to_string()],
            vec!["neg".to_string(), "pos".to_string()],
            model,
        )
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_artifact_name("t1").is_ok());
        assert!(validate_artifact_name("model v2").is_ok());
        for bad in ["", "   ", ".", "..", "../x", "a/b", "a\\b", "x\0"] {
            assert!(
                matches!(validate_artifact_name(bad), Err(TrainerError::EmptyName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("models"));
        let artifact = fitted_artifact("t1");

        let path = store.save(&artifact).unwrap();
        assert_eq!(path, dir.path().join("models").join("t1.json"));
        assert!(store.exists("t1"));

        let loaded = store.load("t1").unwrap();
        let x = array![[-1.5], [1.5]];
        assert_eq!(loaded.predict(&x).unwrap(), artifact.predict(&x).unwrap());
        assert_eq!(loaded.predict_labels(&x).unwrap(), vec!["neg", "pos"]);
        assert_eq!(loaded.model_kind, ModelKind::LogisticRegression);
        assert_eq!(loaded.created_at, artifact.created_at);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&fitted_artifact("a")).unwrap();
        store.save(&fitted_artifact("a")).unwrap();

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.list().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let store = ArtifactStore::new(blocker.join("models"));
        let result = store.save(&fitted_artifact("t1"));
        assert!(matches!(result, Err(TrainerError::Serialization(_))));
        assert!(!store.exists("t1"));
    }

    #[test]
    fn test_non_finite_model_is_refused() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let x = array![[f64::NAN], [-1.0], [1.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = ModelKind::LogisticRegression.build(42);
        model.fit(&x, &y).unwrap();
        let artifact = ModelArtifact::new(
            "nan",
            ScalerKind::Standard,
            "label",
            vec!["x".to_string()],
            vec!["neg".to_string(), "pos".to_string()],
            model,
        );

        let result = store.save(&artifact);
        assert!(matches!(result, Err(TrainerError::Serialization(_))), "{:?}", result);
        assert!(!store.exists("nan"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(store.load("nope"), Err(TrainerError::ModelNotFound(_))));
        assert!(matches!(store.read_bytes("nope"), Err(TrainerError::ModelNotFound(_))));
        assert!(store.list().unwrap().is_empty());
        assert!(ArtifactStore::new(dir.path().join("absent")).list().unwrap().is_empty());
    }

    #[test]
    fn test_export_to_directory() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&fitted_artifact("t1")).unwrap();

        let exported = store.export_to("t1", out.path()).unwrap();
        assert_eq!(exported, out.path().join("t1.json"));
        assert_eq!(fs::read(exported).unwrap(), store.read_bytes("t1").unwrap());
    }
}

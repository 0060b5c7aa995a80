//! Integration test: full pipeline (load → preprocess → train → evaluate → persist)

use automate_ml::prelude::*;
use polars::prelude::*;
use tempfile::TempDir;

/// 100 rows, one numeric feature, labels perfectly separated by `x`
fn create_separable_dataset() -> DataFrame {
    let n = 100;
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);

    for i in 0..n {
        if i < n / 2 {
            x.push(i as f64);
            y.push(0i64);
        } else {
            x.push(i as f64 + 100.0);
            y.push(1i64);
        }
    }

    df!(
        "x" => &x,
        "y" => &y
    )
    .unwrap()
}

fn create_mixed_dataset() -> DataFrame {
    let n = 90;
    let mut size = Vec::with_capacity(n);
    let mut color = Vec::with_capacity(n);
    let mut label = Vec::with_capacity(n);

    for i in 0..n {
        let cls = i % 3;
        size.push(if i % 17 == 0 { None } else { Some(cls as f64 * 10.0 + (i % 5) as f64) });
        color.push(["red", "green", "blue"][cls]);
        label.push(["small", "medium", "large"][cls]);
    }

    df!(
        "size" => &size,
        "color" => &color,
        "label" => &label
    )
    .unwrap()
}

fn pipeline_in(dir: &TempDir) -> TrainingPipeline {
    TrainingPipeline::new(
        PipelineConfig::new()
            .with_models_dir(dir.path().join("trained_models"))
            .with_data_dir(dir.path().join("data")),
    )
}

fn artifact_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path().join("trained_models"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[test]
fn test_separable_logistic_regression() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let df = create_separable_dataset();

    let result = pipeline.run_on_table(&df, "y", ScalerKind::Standard, ModelKind::LogisticRegression, "t1");
    assert!(result.is_ok(), "Pipeline failed: {:?}", result.err());
    let report = result.unwrap();

    assert_eq!(report.accuracy(), 1.0);
    assert_eq!(report.success_message(), "Test Accuracy: 1.00");
    assert_eq!(report.n_train, 80);
    assert_eq!(report.n_test, 20);
    assert_eq!(report.artifact_path, dir.path().join("trained_models").join("t1.json"));
    assert!(report.artifact_path.is_file());
    assert_eq!(artifact_files(&dir), 1);
}

#[test]
fn test_every_model_on_separable_data() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let df = create_separable_dataset();

    for model in ModelKind::ALL {
        for scaler in ScalerKind::ALL {
            let name = format!("{}-{}", model, scaler);
            let result = pipeline.run_on_table(&df, "y", scaler, model, &name);
            assert!(result.is_ok(), "{} failed: {:?}", name, result.err());

            let report = result.unwrap();
            assert!(report.accuracy() >= 0.9, "{} accuracy {}", name, report.accuracy());
            assert_eq!(report.classes, vec!["0", "1"]);
        }
    }
    assert_eq!(artifact_files(&dir), ModelKind::ALL.len() * ScalerKind::ALL.len());
}

#[test]
fn test_missing_target_column() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let df = create_separable_dataset();

    let result = pipeline.run_on_table(&df, "missing", ScalerKind::Standard, ModelKind::LogisticRegression, "t1");
    assert!(matches!(result, Err(TrainerError::ColumnNotFound(ref c)) if c == "missing"));
    assert_eq!(artifact_files(&dir), 0);
}

#[test]
fn test_empty_artifact_name() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let df = create_separable_dataset();

    let result = pipeline.run_on_table(&df, "y", ScalerKind::Standard, ModelKind::RandomForest, "");
    assert!(matches!(result, Err(TrainerError::EmptyName(_))));
    assert_eq!(artifact_files(&dir), 0);
}

#[test]
fn test_same_name_overwrites() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let df = create_separable_dataset();

    pipeline
        .run_on_table(&df, "y", ScalerKind::Standard, ModelKind::LogisticRegression, "shared")
        .unwrap();
    pipeline
        .run_on_table(&df, "y", ScalerKind::MinMax, ModelKind::GradientBoostedTrees, "shared")
        .unwrap();

    let store = ArtifactStore::new(dir.path().join("trained_models"));
    assert_eq!(store.list().unwrap(), vec!["shared"]);
    let artifact = store.load("shared").unwrap();
    assert_eq!(artifact.model_kind, ModelKind::GradientBoostedTrees);
    assert_eq!(artifact.scaler_kind, ScalerKind::MinMax);
}

#[test]
fn test_categorical_multiclass() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let df = create_mixed_dataset();

    let report = pipeline
        .run_on_table(&df, "label", ScalerKind::Standard, ModelKind::RandomForest, "mixed")
        .unwrap();

    assert_eq!(report.classes, vec!["large", "medium", "small"]);
    assert!((0.0..=1.0).contains(&report.accuracy()));

    let artifact = ArtifactStore::new(dir.path().join("trained_models")).load("mixed").unwrap();
    assert_eq!(artifact.target_column, "label");
    assert_eq!(artifact.feature_names[0], "size");
    assert!(artifact.feature_names.iter().any(|f| f == "color_red"));
    assert_eq!(artifact.feature_names.len(), report.n_features);
}

#[test]
fn test_run_from_csv_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("points.csv");
    let mut csv = String::from("x,y\n");
    for i in 0..50 {
        let (x, y) = if i < 25 { (i, "a") } else { (i + 100, "b") };
        csv.push_str(&format!("{},{}\n", x, y));
    }
    std::fs::write(&path, csv).unwrap();

    let pipeline = pipeline_in(&dir);
    let report = pipeline
        .run(&TrainRequest {
            source: DataSource::path(&path),
            format: None,
            target_column: "y".to_string(),
            scaler: ScalerKind::MinMax,
            model: ModelKind::SupportVectorClassifier,
            artifact_name: "points".to_string(),
        })
        .unwrap();

    assert_eq!(report.n_test, 10);
    assert!(report.accuracy() >= 0.9);
}

#[test]
fn test_nan_cells_are_imputed_and_artifact_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("with_nan.csv");
    let mut csv = String::from("x,z,y\n");
    for i in 0..50 {
        let (x, y) = if i < 25 { (i, "a") } else { (i + 100, "b") };
        let z = if i == 7 { "NaN".to_string() } else { format!("{}.5", i % 4) };
        csv.push_str(&format!("{},{},{}\n", x, z, y));
    }
    std::fs::write(&path, csv).unwrap();

    let pipeline = pipeline_in(&dir);
    let report = pipeline
        .run(&TrainRequest {
            source: DataSource::path(&path),
            format: None,
            target_column: "y".to_string(),
            scaler: ScalerKind::Standard,
            model: ModelKind::LogisticRegression,
            artifact_name: "nan".to_string(),
        })
        .unwrap();
    assert!(report.accuracy() >= 0.9, "accuracy {}", report.accuracy());

    let artifact = ArtifactStore::new(dir.path().join("trained_models")).load("nan");
    assert!(artifact.is_ok(), "reload failed: {:?}", artifact.err());
    assert_eq!(artifact.unwrap().feature_names, vec!["x", "z"]);
}

//! Integration test: preprocessing statistics come from the train partition

use std::collections::BTreeSet;

use automate_ml::config::PipelineConfig;
use automate_ml::pipeline::TrainingPipeline;
use automate_ml::preprocessing::{Preprocessor, ScalerKind, TrainTestSplitter};
use automate_ml::training::ModelKind;
use automate_ml::TrainerError;
use polars::prelude::*;
use proptest::prelude::*;
use tempfile::TempDir;

fn frame(values: &[f64]) -> DataFrame {
    let labels: Vec<&str> = (0..values.len()).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
    df!(
        "value" => values,
        "label" => &labels
    )
    .unwrap()
}

/// One numeric column per name; `target` (when present) holds 0/1 labels
fn named_frame(names: &BTreeSet<String>, target: &str, n_rows: usize) -> DataFrame {
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let series = if name == target {
                let labels: Vec<i64> = (0..n_rows).map(|i| (i % 2) as i64).collect();
                Series::new(name.as_str().into(), labels)
            } else {
                let values: Vec<f64> = (0..n_rows).map(|i| (i * (c + 1)) as f64).collect();
                Series::new(name.as_str().into(), values)
            };
            Column::from(series)
        })
        .collect();
    DataFrame::new(columns).unwrap()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn standard_scaler_uses_only_train_rows(
        values in prop::collection::vec(-1000.0f64..1000.0, 5..80),
        seed in any::<u64>(),
    ) {
        let df = frame(&values);
        let data = Preprocessor::new(0.25, seed)
            .prepare(&df, "label", ScalerKind::Standard)
            .unwrap();

        let train: Vec<f64> = data.split.train_indices.iter().map(|&i| values[i]).collect();
        let params = data.scaler.params()["value"];

        prop_assert!(close(params.center, mean(&train)));
        let std = population_std(&train);
        let expected_scale = if std == 0.0 { 1.0 } else { std };
        prop_assert!(close(params.scale, expected_scale));

        for (row, &i) in data.split.test_indices.iter().enumerate() {
            let expected = (values[i] - params.center) / params.scale;
            prop_assert!(close(data.x_test[[row, 0]], expected));
        }
    }

    #[test]
    fn perturbing_test_rows_keeps_scaler_params(
        values in prop::collection::vec(-1000.0f64..1000.0, 5..80),
        noise in -1.0e6f64..1.0e6,
        seed in any::<u64>(),
    ) {
        let preprocessor = Preprocessor::new(0.2, seed);
        for kind in ScalerKind::ALL {
            let before = preprocessor.prepare(&frame(&values), "label", kind).unwrap();

            let mut perturbed = values.clone();
            for &i in &before.split.test_indices {
                perturbed[i] += noise;
            }
            let after = preprocessor.prepare(&frame(&perturbed), "label", kind).unwrap();

            prop_assert_eq!(&before.split, &after.split);
            prop_assert_eq!(before.scaler.params(), after.scaler.params());
            prop_assert_eq!(&before.x_train, &after.x_train);
        }
    }

    #[test]
    fn minmax_scaler_uses_only_train_rows(
        values in prop::collection::vec(-1000.0f64..1000.0, 5..80),
        seed in any::<u64>(),
    ) {
        let df = frame(&values);
        let data = Preprocessor::new(0.3, seed)
            .prepare(&df, "label", ScalerKind::MinMax)
            .unwrap();

        let train: Vec<f64> = data.split.train_indices.iter().map(|&i| values[i]).collect();
        let min = train.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = train.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let params = data.scaler.params()["value"];
        prop_assert!(close(params.center, min));
        if max > min {
            prop_assert!(close(params.scale, max - min));
        }
        for v in data.x_train.column(0) {
            prop_assert!(*v >= -1e-9 && *v <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn present_target_is_always_found(
        names in prop::collection::btree_set("[a-z]{1,6}", 2..6),
        pick in any::<prop::sample::Index>(),
        n_rows in 10usize..40,
        seed in any::<u64>(),
    ) {
        let target = pick.get(&names.iter().cloned().collect::<Vec<_>>()).clone();
        let df = named_frame(&names, &target, n_rows);

        for kind in ScalerKind::ALL {
            let result = Preprocessor::new(0.2, seed).prepare(&df, &target, kind);
            prop_assert!(result.is_ok(), "target {:?} in {:?}: {:?}", target, names, result.err());
        }
    }

    #[test]
    fn absent_target_is_reported_before_splitting(
        names in prop::collection::btree_set("[a-z]{1,6}", 1..6),
        target in "[a-z]{1,7}",
        n_rows in 1usize..30,
    ) {
        prop_assume!(!names.contains(&target));
        let df = named_frame(&names, &target, n_rows);

        let result = Preprocessor::default().prepare(&df, &target, ScalerKind::Standard);
        prop_assert!(matches!(result, Err(TrainerError::ColumnNotFound(ref c)) if c == &target));

        let dir = TempDir::new().unwrap();
        let models_dir = dir.path().join("models");
        let pipeline = TrainingPipeline::new(PipelineConfig::new().with_models_dir(&models_dir));
        let result = pipeline.run_on_table(&df, &target, ScalerKind::MinMax, ModelKind::LogisticRegression, "run");
        prop_assert!(matches!(result, Err(TrainerError::ColumnNotFound(_))));
        prop_assert!(!models_dir.exists() || std::fs::read_dir(&models_dir).unwrap().count() == 0);
    }

    #[test]
    fn split_is_deterministic_partition(
        n in 2usize..500,
        test_size in 0.05f64..0.95,
        seed in any::<u64>(),
    ) {
        let splitter = TrainTestSplitter::new(test_size, seed);
        let first = splitter.split(n);
        let second = splitter.split(n);

        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(&a.train_indices, &b.train_indices);
                prop_assert_eq!(&a.test_indices, &b.test_indices);

                let mut all: Vec<usize> = a.train_indices.iter().chain(a.test_indices.iter()).copied().collect();
                all.sort_unstable();
                prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
                prop_assert_eq!(a.test_indices.len(), splitter.n_test(n));
            }
            (Err(TrainerError::InsufficientData(_)), Err(TrainerError::InsufficientData(_))) => {
                prop_assert!(splitter.n_test(n) == 0 || splitter.n_test(n) == n);
            }
            (a, b) => prop_assert!(false, "inconsistent split results: {:?} / {:?}", a, b),
        }
    }
}

#[test]
fn test_test_categories_do_not_leak() {
    // "violet" only ever appears in rows that land in the test partition
    let n = 40;
    let splitter = TrainTestSplitter::new(0.2, 42);
    let split = splitter.split(n).unwrap();

    let color: Vec<&str> = (0..n)
        .map(|i| if split.test_indices.contains(&i) { "violet" } else if i % 2 == 0 { "red" } else { "blue" })
        .collect();
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let y: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
    let df = df!("x" => &x, "color" => &color, "y" => &y).unwrap();

    let data = Preprocessor::new(0.2, 42).prepare(&df, "y", ScalerKind::Standard).unwrap();

    assert_eq!(data.feature_names, vec!["x", "color_blue", "color_red"]);
    for row in 0..data.n_test() {
        assert_eq!(data.x_test[[row, 1]], 0.0);
        assert_eq!(data.x_test[[row, 2]], 0.0);
    }
}

#[test]
fn test_missing_numeric_values_filled_from_train_mean() {
    let values: Vec<Option<f64>> = (0..30).map(|i| if i % 5 == 0 { None } else { Some(i as f64) }).collect();
    let y: Vec<&str> = (0..30).map(|i| if i < 15 { "a" } else { "b" }).collect();
    let df = df!("v" => &values, "y" => &y).unwrap();

    let data = Preprocessor::default().prepare(&df, "y", ScalerKind::Standard).unwrap();

    assert!(data.x_train.iter().all(|v| v.is_finite()));
    assert!(data.x_test.iter().all(|v| v.is_finite()));
}

#[test]
fn test_indicator_names_never_replace_features() {
    let n = 30;
    let numeric: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
    let color: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "red" } else { "blue" }).collect();
    let y: Vec<i64> = (0..n).map(|i| (i % 3 == 0) as i64).collect();
    let df = df!("color_red" => &numeric, "color" => &color, "y" => &y).unwrap();

    let data = Preprocessor::new(0.2, 42).prepare(&df, "y", ScalerKind::MinMax).unwrap();

    assert_eq!(data.feature_names, vec!["color_red", "color_blue", "color_red_1"]);
    // the numeric feature keeps its min-max scaled values, not 0/1 indicators
    for (row, &i) in data.split.train_indices.iter().enumerate() {
        let indicator = if color[i] == "red" { 1.0 } else { 0.0 };
        assert_eq!(data.x_train[[row, 2]], indicator);
    }
    let scaled: Vec<f64> = data.x_train.column(0).to_vec();
    assert!(scaled.iter().any(|v| *v > 0.0 && *v < 1.0));
}

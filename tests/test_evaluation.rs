//! Integration test: accuracy scoring

use automate_ml::evaluation::{accuracy, Evaluator};
use automate_ml::training::{Classifier, ModelKind};
use automate_ml::TrainerError;
use ndarray::{array, Array1, Array2};
use proptest::prelude::*;

proptest! {
    #[test]
    fn accuracy_is_a_fraction(pairs in prop::collection::vec((0u8..3, 0u8..3), 1..200)) {
        let predictions: Array1<f64> = pairs.iter().map(|(p, _)| *p as f64).collect();
        let labels: Array1<f64> = pairs.iter().map(|(_, l)| *l as f64).collect();

        let report = accuracy(&predictions, &labels).unwrap();
        prop_assert!((0.0..=1.0).contains(&report.accuracy));
        prop_assert!(report.n_correct <= report.n_samples);
        prop_assert_eq!(report.n_samples, pairs.len());

        let expected = pairs.iter().filter(|(p, l)| p == l).count();
        prop_assert_eq!(report.n_correct, expected);
    }

    #[test]
    fn identical_predictions_score_one(labels in prop::collection::vec(0u8..4, 1..100)) {
        let labels: Array1<f64> = labels.iter().map(|&l| l as f64).collect();
        let report = accuracy(&labels, &labels).unwrap();
        prop_assert_eq!(report.accuracy, 1.0);
    }
}

#[test]
fn test_all_wrong_scores_zero() {
    let report = accuracy(&array![1.0, 1.0, 0.0], &array![0.0, 0.0, 1.0]).unwrap();
    assert_eq!(report.accuracy, 0.0);
    assert_eq!(report.success_message(), "Test Accuracy: 0.00");
}

#[test]
fn test_empty_test_set() {
    let empty = Array1::<f64>::zeros(0);
    assert!(matches!(accuracy(&empty, &empty), Err(TrainerError::EmptyTestSet)));
}

#[test]
fn test_evaluator_on_fitted_model() {
    let x = array![[0.0], [0.2], [0.4], [5.0], [5.2], [5.4]];
    let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    let mut model = ModelKind::GradientBoostedTrees.build(42);
    model.fit(&x, &y).unwrap();

    let report = Evaluator::new().evaluate(&model, &array![[0.1], [5.1]], &array![0.0, 1.0]).unwrap();
    assert_eq!(report.n_samples, 2);
    assert_eq!(report.accuracy, 1.0);

    let result = Evaluator::new().evaluate(&model, &Array2::zeros((0, 1)), &Array1::zeros(0));
    assert!(matches!(result, Err(TrainerError::EmptyTestSet)));
}

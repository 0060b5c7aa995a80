//! Test-partition scoring

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TrainerError};
use crate::training::Classifier;

/// Accuracy of a fitted model on held-out rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Fraction of rows predicted correctly, in [0, 1]
    pub accuracy: f64,
    pub n_correct: usize,
    pub n_samples: usize,
}

impl EvaluationReport {
    pub fn success_message(&self) -> String {
        format!("Test Accuracy: {:.2}", self.accuracy)
    }
}

/// Fraction of positions where `predictions` equals `labels`
pub fn accuracy(predictions: &Array1<f64>, labels: &Array1<f64>) -> Result<EvaluationReport> {
    if predictions.len() != labels.len() {
        return Err(TrainerError::Shape {
            expected: format!("{} predictions", labels.len()),
            actual: format!("{} predictions", predictions.len()),
        });
    }
    if labels.is_empty() {
        return Err(TrainerError::EmptyTestSet);
    }

    let n_correct = predictions
        .iter()
        .zip(labels.iter())
        .filter(|(p, l)| p == l)
        .count();
    Ok(EvaluationReport {
        accuracy: n_correct as f64 / labels.len() as f64,
        n_correct,
        n_samples: labels.len(),
    })
}

/// Scores fitted classifiers on the test partition
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, model: &dyn Classifier, x_test: &Array2<f64>, y_test: &Array1<f64>) -> Result<EvaluationReport> {
        if x_test.nrows() == 0 {
            return Err(TrainerError::EmptyTestSet);
        }
        let predictions = model.predict(x_test)?;
        let report = accuracy(&predictions, y_test)?;
        info!(
            accuracy = report.accuracy,
            n_correct = report.n_correct,
            n_samples = report.n_samples,
            "Evaluated on test partition"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ModelKind, TrainedModel};
    use ndarray::array;

    #[test]
    fn test_accuracy_counts() {
        let report = accuracy(&array![0.0, 1.0, 1.0, 0.0], &array![0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(report.n_correct, 3);
        assert_eq!(report.n_samples, 4);
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(report.success_message(), "Test Accuracy: 0.75");
    }

    #[test]
    fn test_message_rounds_to_two_decimals() {
        let report = accuracy(&array![0.0, 1.0, 1.0], &array![0.0, 1.0, 0.0]).unwrap();
        assert_eq!(report.success_message(), "Test Accuracy: 0.67");
    }

    #[test]
    fn test_empty_and_mismatched() {
        let empty = Array1::<f64>::zeros(0);
        assert!(matches!(accuracy(&empty, &empty), Err(TrainerError::EmptyTestSet)));
        assert!(matches!(
            accuracy(&array![0.0], &array![0.0, 1.0]),
            Err(TrainerError::Shape { .. })
        ));
    }

    #[test]
    fn test_evaluate_rejects_empty_test_partition() {
        let mut model: TrainedModel = ModelKind::LogisticRegression.build(0);
        model.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).unwrap();

        let result = Evaluator::new().evaluate(&model, &Array2::zeros((0, 1)), &Array1::zeros(0));
        assert!(matches!(result, Err(TrainerError::EmptyTestSet)));
    }
}

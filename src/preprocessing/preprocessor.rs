//! Table to model-ready partitions

use std::time::Instant;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, info, warn};

use super::encoder::{LabelEncoder, OneHotEncoder};
use super::imputer::{ImputeStrategy, Imputer};
use super::scaler::{Scaler, ScalerKind};
use super::split::{TrainTestSplit, TrainTestSplitter};
use crate::config::PipelineConfig;
use crate::error::{Result, TrainerError};

/// Output of [`Preprocessor::prepare`]
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    /// Class indices into `classes`
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    /// Column order of the feature matrices
    pub feature_names: Vec<String>,
    /// Label for each class index
    pub classes: Vec<String>,
    /// Row indices of the (null-target-free) table in each partition
    pub split: TrainTestSplit,
    /// Scaler fitted on the train partition's numeric features
    pub scaler: Scaler,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl PreparedData {
    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_test(&self) -> usize {
        self.x_test.nrows()
    }
}

/// Splits a table and turns its features into scaled numeric matrices.
///
/// Every fitted statistic (imputation fills, scaler parameters, one-hot
/// categories) comes from the train partition alone.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    splitter: TrainTestSplitter,
}

impl Preprocessor {
    pub fn new(test_size: f64, random_state: u64) -> Self {
        Self {
            splitter: TrainTestSplitter::new(test_size, random_state),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.test_size, config.random_state)
    }

    pub fn prepare(&self, df: &DataFrame, target: &str, scaler_kind: ScalerKind) -> Result<PreparedData> {
        let start = Instant::now();

        let target_column = df
            .column(target)
            .map_err(|_| TrainerError::ColumnNotFound(target.to_string()))?;

        let df = if target_column.null_count() > 0 {
            warn!(
                target = %target,
                dropped = target_column.null_count(),
                "Dropping rows with a missing target value"
            );
            let mask = target_column.as_materialized_series().is_not_null();
            df.filter(&mask)?
        } else {
            df.clone()
        };

        let (numeric_columns, categorical_columns) = feature_columns(&df, target);
        if numeric_columns.is_empty() && categorical_columns.is_empty() {
            return Err(TrainerError::InsufficientData(format!(
                "no feature columns besides target '{}'",
                target
            )));
        }

        let split = self.splitter.split(df.height())?;
        let train_df = df.take(&row_index(&split.train_indices))?;
        let test_df = df.take(&row_index(&split.test_indices))?;
        debug!(
            train = split.train_indices.len(),
            test = split.test_indices.len(),
            "Split rows"
        );

        let numeric: Vec<&str> = numeric_columns.iter().map(String::as_str).collect();
        let categorical: Vec<&str> = categorical_columns.iter().map(String::as_str).collect();

        let mut numeric_imputer = Imputer::new(ImputeStrategy::Mean);
        numeric_imputer.fit(&train_df, &numeric)?;
        let train_df = numeric_imputer.transform(&train_df)?;
        let test_df = numeric_imputer.transform(&test_df)?;

        let mut scaler = Scaler::new(scaler_kind);
        scaler.fit(&train_df, &numeric)?;
        let train_df = scaler.transform(&train_df)?;
        let test_df = scaler.transform(&test_df)?;

        let mut categorical_imputer = Imputer::new(ImputeStrategy::MostFrequent);
        categorical_imputer.fit(&train_df, &categorical)?;
        let train_df = categorical_imputer.transform(&train_df)?;
        let test_df = categorical_imputer.transform(&test_df)?;

        let mut encoder = OneHotEncoder::new();
        encoder.fit(&train_df, &categorical)?;
        let train_df = encoder.transform(&train_df)?;
        let test_df = encoder.transform(&test_df)?;

        let mut feature_names = numeric_columns.clone();
        feature_names.extend(encoder.feature_names());

        let x_train = columns_to_array2(&train_df, &feature_names)?;
        let x_test = columns_to_array2(&test_df, &feature_names)?;

        let mut labels = LabelEncoder::new();
        labels.fit(df.column(target)?.as_materialized_series())?;
        let y_train = Array1::from(labels.transform(train_df.column(target)?.as_materialized_series())?);
        let y_test = Array1::from(labels.transform(test_df.column(target)?.as_materialized_series())?);

        info!(
            target = %target,
            scaler = %scaler_kind,
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = feature_names.len(),
            classes = labels.n_classes(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessed table"
        );

        Ok(PreparedData {
            x_train,
            x_test,
            y_train,
            y_test,
            feature_names,
            classes: labels.classes().to_vec(),
            split,
            scaler,
            numeric_columns,
            categorical_columns,
        })
    }
}

/// Split non-target columns into numeric (incl. boolean) and categorical
fn feature_columns(df: &DataFrame, target: &str) -> (Vec<String>, Vec<String>) {
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for column in df.get_columns() {
        let name = column.name().to_string();
        if name == target {
            continue;
        }
        let dtype = column.dtype();
        if dtype.is_primitive_numeric() || dtype == &DataType::Boolean {
            numeric.push(name);
        } else {
            categorical.push(name);
        }
    }
    (numeric, categorical)
}

fn row_index(rows: &[usize]) -> IdxCa {
    IdxCa::from_vec("row".into(), rows.iter().map(|&r| r as IdxSize).collect())
}

/// Gather named `Float64`-castable columns into a row-major matrix
pub(crate) fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| TrainerError::ColumnNotFound(col_name.clone()))?;
            let values: Vec<f64> = column
                .as_materialized_series()
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}

//! Missing value imputation

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Strategy for imputing missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric columns)
    Mean,
    /// Replace with most frequent value (categorical columns)
    MostFrequent,
}

/// Fill used for an all-missing categorical column
pub const MISSING_CATEGORY: &str = "missing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    Text(String),
}

/// Imputer for handling missing values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: BTreeMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: BTreeMap::new(),
            is_fitted: false,
        }
    }

    /// Learn fill values from `df`.
    ///
    /// `Mean` casts columns to `Float64` and counts NaN and infinite values as
    /// missing; `MostFrequent` casts to `String`.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.fill_values.clear();
        for col_name in columns {
            let series = self.prepared_series(df, col_name)?;
            let fill_value = self.compute_fill_value(&series)?;
            self.fill_values.insert(col_name.to_string(), fill_value);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Fill missing values in every fitted column of `df`
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, fill_value) in &self.fill_values {
            let series = self.prepared_series(df, col_name)?;
            let filled = fill_series(&series, fill_value)?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn prepared_series(&self, df: &DataFrame, col_name: &str) -> Result<Series> {
        let column = df
            .column(col_name)
            .map_err(|_| TrainerError::ColumnNotFound(col_name.to_string()))?;
        let series = column.as_materialized_series();
        match self.strategy {
            ImputeStrategy::Mean => {
                let finite: Float64Chunked = series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect();
                Ok(finite.with_name(series.name().clone()).into_series())
            }
            ImputeStrategy::MostFrequent => Ok(series.cast(&DataType::String)?),
        }
    }

    fn compute_fill_value(&self, series: &Series) -> Result<ImputeValue> {
        match self.strategy {
            ImputeStrategy::Mean => Ok(ImputeValue::Numeric(series.f64()?.mean().unwrap_or(0.0))),
            ImputeStrategy::MostFrequent => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for value in series.str()?.into_iter().flatten() {
                    *counts.entry(value).or_insert(0) += 1;
                }
                // Ties go to the lexicographically smallest value.
                let mode = counts
                    .iter()
                    .fold(None::<(&str, usize)>, |best, (&v, &c)| match best {
                        Some((_, bc)) if bc >= c => best,
                        _ => Some((v, c)),
                    })
                    .map(|(v, _)| v.to_string())
                    .unwrap_or_else(|| MISSING_CATEGORY.to_string());
                Ok(ImputeValue::Text(mode))
            }
        }
    }
}

fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
    let name = series.name().clone();
    match fill_value {
        ImputeValue::Numeric(val) => {
            let filled: Float64Chunked = series
                .f64()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(*val)))
                .collect();
            Ok(filled.with_name(name).into_series())
        }
        ImputeValue::Text(val) => {
            let filled: StringChunked = series
                .str()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(val.as_str())))
                .collect();
            Ok(filled.with_name(name).into_series())
        }
    }
}

//! Categorical encoding
//!
//! [`OneHotEncoder`] expands categorical feature columns into indicator
//! columns. [`LabelEncoder`] maps target values to class indices.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// One-hot encoder over string columns.
///
/// Categories are learned from the fit frame only; a value never seen
/// during fit encodes to all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    // fitted columns in fit order
    columns: Vec<EncodedColumn>,
    is_fitted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncodedColumn {
    name: String,
    /// Sorted categories
    categories: Vec<String>,
    /// Indicator column name per category
    indicators: Vec<String>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the categories of `columns`.
    ///
    /// Indicators are named `<column>_<category>`. A name already taken by a
    /// column of `df` or by an earlier indicator gets a numeric suffix
    /// (`color_red_1`), so no existing feature is ever replaced.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.columns.clear();
        let mut taken: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        for col_name in columns {
            let series = string_series(df, col_name)?;
            let categories: Vec<String> = series
                .str()?
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let indicators = categories
                .iter()
                .map(|category| unique_name(&mut taken, indicator_name(col_name, category)))
                .collect();

            self.columns.push(EncodedColumn {
                name: col_name.to_string(),
                categories,
                indicators,
            });
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each fitted column with one `Float64` indicator column per
    /// category.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }

        let mut result = df.clone();
        for column in &self.columns {
            let series = string_series(df, &column.name)?;
            let ca = series.str()?;

            for (category, indicator) in column.categories.iter().zip(&column.indicators) {
                let values: Vec<f64> = ca
                    .into_iter()
                    .map(|v| if v == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                result.with_column(Series::new(indicator.as_str().into(), values))?;
            }

            result = result.drop(&column.name)?;
        }

        Ok(result)
    }

    /// Names of the indicator columns produced by `transform`, in order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|column| column.indicators.iter().cloned())
            .collect()
    }
}

fn indicator_name(column: &str, category: &str) -> String {
    format!("{}_{}", column, category)
}

fn unique_name(taken: &mut HashSet<String>, base: String) -> String {
    let mut name = base.clone();
    let mut suffix = 1;
    while taken.contains(&name) {
        name = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    taken.insert(name.clone());
    name
}

fn string_series(df: &DataFrame, col_name: &str) -> Result<Series> {
    let column = df
        .column(col_name)
        .map_err(|_| TrainerError::ColumnNotFound(col_name.to_string()))?;
    Ok(column.as_materialized_series().cast(&DataType::String)?)
}

/// Encoder from target values to class indices `0..n_classes`
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the class set of `series`, ignoring nulls.
    ///
    /// Numeric targets are ordered by value, everything else lexically.
    pub fn fit(&mut self, series: &Series) -> Result<&mut Self> {
        let numeric = series.dtype().is_primitive_numeric();
        let text = series.cast(&DataType::String)?;
        let distinct: BTreeSet<String> = text
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();

        let mut classes: Vec<String> = distinct.into_iter().collect();
        if numeric {
            classes.sort_by(|a, b| {
                let (x, y) = (a.parse::<f64>().unwrap_or(f64::NAN), b.parse::<f64>().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            });
        }

        self.index = index_of(&classes);
        self.classes = classes;
        Ok(self)
    }

    /// Ordered class names
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode non-null values of `series` as class indices
    pub fn transform(&self, series: &Series) -> Result<Vec<f64>> {
        let text = series.cast(&DataType::String)?;
        text.str()?
            .into_iter()
            .map(|v| {
                let v = v.ok_or_else(|| {
                    TrainerError::Training(format!("target column '{}' has missing values", series.name()))
                })?;
                self.index
                    .get(v)
                    .map(|&i| i as f64)
                    .ok_or_else(|| TrainerError::Training(format!("unknown class label '{}'", v)))
            })
            .collect()
    }

    /// Map a class index back to its label
    pub fn decode(&self, class_index: f64) -> Option<&str> {
        if class_index < 0.0 {
            return None;
        }
        self.classes.get(class_index as usize).map(String::as_str)
    }
}

fn index_of(classes: &[String]) -> HashMap<String, usize> {
    classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i))
        .collect()
}

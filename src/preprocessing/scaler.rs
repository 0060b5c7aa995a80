//! Feature scaling
//!
//! Parameters are learned from one frame (the train partition) and then
//! applied unchanged to any other frame with the same columns.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Scaling method offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerKind {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

impl ScalerKind {
    pub const ALL: [ScalerKind; 2] = [ScalerKind::Standard, ScalerKind::MinMax];

    /// Identifier used on the command line and in artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalerKind::Standard => "standard",
            ScalerKind::MinMax => "minmax",
        }
    }
}

impl fmt::Display for ScalerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalerKind {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ScalerKind::Standard),
            "minmax" | "min-max" => Ok(ScalerKind::MinMax),
            other => Err(TrainerError::Config(format!(
                "unknown scaler '{}' (expected standard or minmax)",
                other
            ))),
        }
    }
}

/// Fitted parameters for one column: `scaled = (v - center) / scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean or min
    pub center: f64,
    /// std or range, never zero
    pub scale: f64,
}

/// Feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    kind: ScalerKind,
    params: BTreeMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(kind: ScalerKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            is_fitted: false,
        }
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted parameters keyed by column name
    pub fn params(&self) -> &BTreeMap<String, ScalerParams> {
        &self.params
    }

    /// Learn per-column parameters from `df`. Columns must be numeric.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.params.clear();
        for col_name in columns {
            let series = float_series(df, col_name)?;
            let params = self.compute_params(&series)?;
            self.params.insert(col_name.to_string(), params);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Apply the fitted parameters to every fitted column of `df`
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }

        let replacements = self
            .params
            .iter()
            .map(|(col_name, params)| {
                let series = float_series(df, col_name)?;
                scale_series(&series, params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let ca = series.f64()?;

        let (center, scale) = match self.kind {
            ScalerKind::Standard => {
                let mean = ca.mean().unwrap_or(0.0);
                let std = ca.std(0).unwrap_or(1.0);
                (mean, std)
            }
            ScalerKind::MinMax => {
                let min = ca.min().unwrap_or(0.0);
                let max = ca.max().unwrap_or(1.0);
                (min, max - min)
            }
        };

        Ok(ScalerParams {
            center,
            scale: if scale == 0.0 || !scale.is_finite() { 1.0 } else { scale },
        })
    }
}

fn float_series(df: &DataFrame, col_name: &str) -> Result<Series> {
    let column = df
        .column(col_name)
        .map_err(|_| TrainerError::ColumnNotFound(col_name.to_string()))?;
    Ok(column.as_materialized_series().cast(&DataType::Float64)?)
}

fn scale_series(series: &Series, params: &ScalerParams) -> Result<Series> {
    let ca = series.f64()?;

    let scaled: Float64Chunked = ca
        .into_iter()
        .map(|opt| opt.map(|v| (v - params.center) / params.scale))
        .collect();

    Ok(scaled.with_name(series.name().clone()).into_series())
}

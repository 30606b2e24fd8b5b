use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::indicator::stats;
use crate::model::feature_row::FeatureVector;

/// Per-column medians fitted once on training rows.
///
/// `transform` takes `&self`: applying the imputer never changes its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Vec<f64>,
}

impl MedianImputer {
    pub fn fit(rows: &[FeatureVector]) -> Result<Self> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.is_empty() {
            return Err(PipelineError::EmptyDataset(
                "cannot fit imputer on zero rows".to_string(),
            ));
        }
        let mut medians = Vec::with_capacity(width);
        for col in 0..width {
            let values: Vec<f64> = rows.iter().filter_map(|r| r[col]).collect();
            let median = stats::median(&values).ok_or_else(|| {
                PipelineError::FeaturePreparation(format!(
                    "feature column {} has no observed values",
                    col
                ))
            })?;
            medians.push(median);
        }
        Ok(Self { medians })
    }

    pub fn from_medians(medians: Vec<f64>) -> Self {
        Self { medians }
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    /// Replace missing or non-finite entries with the fitted medians.
    pub fn transform(&self, features: &[Option<f64>]) -> Result<Vec<f64>> {
        if features.len() != self.medians.len() {
            return Err(PipelineError::FeaturePreparation(format!(
                "imputer expects {} features, got {}",
                self.medians.len(),
                features.len()
            )));
        }
        Ok(features
            .iter()
            .zip(&self.medians)
            .map(|(v, m)| match v {
                Some(x) if x.is_finite() => *x,
                _ => *m,
            })
            .collect())
    }
}

/// Zero-mean / unit-variance scaling with training-fit statistics.
/// A constant column keeps unit scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(PipelineError::EmptyDataset(
                "cannot fit scaler on zero rows".to_string(),
            ));
        };
        let width = first.len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(PipelineError::FeaturePreparation(
                "ragged feature matrix".to_string(),
            ));
        }
        let mut means = Vec::with_capacity(width);
        let mut stds = Vec::with_capacity(width);
        for col in 0..width {
            let values: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            let mean = stats::mean(&values).unwrap_or(0.0);
            let std = stats::population_variance(&values)
                .map(f64::sqrt)
                .filter(|s| *s > f64::EPSILON)
                .unwrap_or(1.0);
            means.push(mean);
            stds.push(std);
        }
        Ok(Self { means, stds })
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.means.len() {
            return Err(PipelineError::FeaturePreparation(format!(
                "scaler expects {} features, got {}",
                self.means.len(),
                features.len()
            )));
        }
        Ok(features
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }
}

/// Imputer followed by scaler, the exact input contract of a forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub imputer: MedianImputer,
    pub scaler: StandardScaler,
}

impl Preprocessor {
    pub fn fit(rows: &[FeatureVector]) -> Result<Self> {
        let imputer = MedianImputer::fit(rows)?;
        let imputed = rows
            .iter()
            .map(|r| imputer.transform(r))
            .collect::<Result<Vec<_>>>()?;
        let scaler = StandardScaler::fit(&imputed)?;
        Ok(Self { imputer, scaler })
    }

    pub fn transform(&self, features: &[Option<f64>]) -> Result<Vec<f64>> {
        let imputed = self.imputer.transform(features)?;
        self.scaler.transform(&imputed)
    }
}

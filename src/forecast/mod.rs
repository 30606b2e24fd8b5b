//! Return forecast contract and the preprocessing that feeds it.

pub mod evaluate;
pub mod linear;
pub mod preprocess;
pub mod tree;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub use evaluate::{fold_bounds, holdout_split, kfold_linear_mse, HoldoutReport};
pub use linear::LinearForecaster;
pub use preprocess::{MedianImputer, Preprocessor, StandardScaler};
pub use tree::{RegressionNode, RegressionTree, TreeEnsembleForecaster};

/// A fitted regressor: scaled feature vector in, predicted forward return out.
///
/// Implementors must be `Send + Sync`; one snapshot is shared read-only for a run.
pub trait Forecaster: Send + Sync {
    /// Fails with [`PipelineError::FeaturePreparation`] on a malformed input.
    fn predict(&self, features: &[f64]) -> Result<f64>;

    fn name(&self) -> &str;

    fn n_features(&self) -> usize;

    /// Structural check of the fitted parameters, run before the model is
    /// accepted into a pipeline.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn check_width<F: Forecaster + ?Sized>(model: &F, features: &[f64]) -> Result<()> {
    if features.len() != model.n_features() {
        return Err(PipelineError::FeaturePreparation(format!(
            "{} expects {} features, got {}",
            model.name(),
            model.n_features(),
            features.len()
        )));
    }
    if let Some(bad) = features.iter().position(|v| !v.is_finite()) {
        return Err(PipelineError::FeaturePreparation(format!(
            "{} received non-finite feature at position {}",
            model.name(),
            bad
        )));
    }
    Ok(())
}

/// Serialized forecaster artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum ReturnModel {
    Linear(LinearForecaster),
    TreeEnsemble(TreeEnsembleForecaster),
}

impl Forecaster for ReturnModel {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        match self {
            Self::Linear(m) => m.predict(features),
            Self::TreeEnsemble(m) => m.predict(features),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Linear(m) => m.name(),
            Self::TreeEnsemble(m) => m.name(),
        }
    }

    fn n_features(&self) -> usize {
        match self {
            Self::Linear(m) => m.n_features(),
            Self::TreeEnsemble(m) => m.n_features(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Linear(m) => m.validate(),
            Self::TreeEnsemble(m) => m.validate(),
        }
    }
}

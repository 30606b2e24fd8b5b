//! Regression forest evaluated from an exported node table.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "name": "forest-v1",
//!   "n_features": 3,
//!   "trees": [
//!     { "nodes": [
//!         { "feature": 0, "threshold": 0.1, "left": 1, "right": 2, "value": null },
//!         { "feature": -1, "threshold": 0.0, "left": -1, "right": -1, "value": 0.02 },
//!         { "feature": -1, "threshold": 0.0, "left": -1, "right": -1, "value": -0.01 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! A node with `feature == -1` is a leaf. Internal nodes send
//! `x[feature] <= threshold` (and NaN) left, everything else right. The
//! prediction is the mean leaf value across trees.

use serde::{Deserialize, Serialize};

use super::{check_width, Forecaster};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionNode {
    pub feature: i32,
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(PipelineError::Artifact("tree has no nodes".to_string()));
        }
        let n = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.feature < 0 {
                if node.value.map_or(true, |v| !v.is_finite()) {
                    return Err(PipelineError::Artifact(format!(
                        "leaf {} has no finite value",
                        i
                    )));
                }
                continue;
            }
            if node.feature as usize >= n_features {
                return Err(PipelineError::Artifact(format!(
                    "node {} splits on feature {} but model has {}",
                    i, node.feature, n_features
                )));
            }
            // Children must point forward; this also rules out cycles.
            let forward = |c: i32| c > i as i32 && c < n;
            if !forward(node.left) || !forward(node.right) {
                return Err(PipelineError::Artifact(format!(
                    "node {} has invalid children ({}, {})",
                    i, node.left, node.right
                )));
            }
        }
        Ok(())
    }

    /// Walks from the root to a leaf. A node table that was never checked can
    /// still point out of range or revisit a node, so every hop is bounded.
    fn evaluate(&self, features: &[f64]) -> Result<f64> {
        let mut idx = 0usize;
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx).ok_or_else(|| {
                PipelineError::Artifact(format!("tree points at missing node {}", idx))
            })?;
            if node.feature < 0 {
                return node.value.filter(|v| v.is_finite()).ok_or_else(|| {
                    PipelineError::Artifact(format!("leaf {} has no finite value", idx))
                });
            }
            let x = features.get(node.feature as usize).copied().ok_or_else(|| {
                PipelineError::FeaturePreparation(format!(
                    "node {} splits on feature {} but input has {}",
                    idx,
                    node.feature,
                    features.len()
                ))
            })?;
            let next = if x.is_nan() || x <= node.threshold {
                node.left
            } else {
                node.right
            };
            idx = usize::try_from(next).map_err(|_| {
                PipelineError::Artifact(format!("node {} has invalid child {}", idx, next))
            })?;
        }
        Err(PipelineError::Artifact(
            "tree walk did not reach a leaf".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleForecaster {
    pub name: String,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl TreeEnsembleForecaster {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

impl Forecaster for TreeEnsembleForecaster {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        check_width(self, features)?;
        if self.trees.is_empty() {
            return Err(PipelineError::Artifact(format!(
                "forest `{}` has no trees",
                self.name
            )));
        }
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(features)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PipelineError::Artifact(format!(
                "forest `{}` has no trees",
                self.name
            )));
        }
        for tree in &self.trees {
            tree.validate(self.n_features)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::labels::ClusterCentroid;
use crate::error::{PipelineError, Result};
use crate::model::feature_row::{FeatureRow, FEATURE_COUNT};

/// Pre-fit nearest-centroid classifier.
///
/// Inputs are `[ln(1 + volatility), momentum, beta]`, robust-scaled with
/// `(x - center) / scale`; `centroids` live in that scaled space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidClassifier {
    pub center: [f64; FEATURE_COUNT],
    pub scale: [f64; FEATURE_COUNT],
    pub centroids: Vec<[f64; FEATURE_COUNT]>,
}

impl CentroidClassifier {
    pub fn validate(&self) -> Result<()> {
        if self.centroids.is_empty() {
            return Err(PipelineError::Artifact(
                "classifier has no centroids".to_string(),
            ));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(PipelineError::Artifact(
                "classifier scale must be finite and positive".to_string(),
            ));
        }
        let finite = self
            .center
            .iter()
            .chain(self.centroids.iter().flatten())
            .all(|v| v.is_finite());
        if !finite {
            return Err(PipelineError::Artifact(
                "classifier contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// Nearest centroid by squared Euclidean distance; ties go to the lower id.
    /// A missing beta sits at the scaler center.
    pub fn classify(&self, row: &FeatureRow) -> Result<usize> {
        let raw = [
            row.volatility_30.ln_1p(),
            row.momentum_30,
            row.beta_60.unwrap_or(self.center[2]),
        ];
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::FeaturePreparation(format!(
                "non-finite classifier input for {}",
                row.ticker
            )));
        }
        let mut scaled = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            scaled[j] = (raw[j] - self.center[j]) / self.scale[j];
        }

        let mut best: Option<(usize, f64)> = None;
        for (id, c) in self.centroids.iter().enumerate() {
            let d: f64 = scaled.iter().zip(c.iter()).map(|(a, b)| (a - b).powi(2)).sum();
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
            .ok_or_else(|| PipelineError::Artifact("classifier has no centroids".to_string()))
    }

    pub fn assign_rows(&self, rows: &[&FeatureRow]) -> Result<BTreeMap<String, usize>> {
        let mut out = BTreeMap::new();
        for row in rows {
            out.insert(row.ticker.clone(), self.classify(row)?);
        }
        Ok(out)
    }

    /// Centroids mapped back to raw units, reduced to their volatility coordinate.
    pub fn raw_centroids(&self) -> Vec<ClusterCentroid> {
        self.centroids
            .iter()
            .enumerate()
            .map(|(cluster_id, c)| ClusterCentroid {
                cluster_id,
                volatility: (c[0] * self.scale[0] + self.center[0]).exp_m1(),
            })
            .collect()
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::forecast::{Forecaster, MedianImputer, Preprocessor, ReturnModel, StandardScaler};
use crate::pipeline::{PipelineContext, TrainedModel};
use crate::risk::{BucketSource, CentroidClassifier, ClusterCentroid};

pub const IMPUTER_FILE: &str = "imputer.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const FORECASTER_FILE: &str = "forecaster.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const CLUSTERS_FILE: &str = "clusters.json";

/// Cluster centroids of one fit together with the instrument assignments it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub centroids: Vec<ClusterCentroid>,
    pub assignments: BTreeMap<String, usize>,
}

/// Where the JSON artifacts of one model snapshot live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    pub fn save_model(&self, model: &TrainedModel) -> Result<()> {
        write_json(&self.path(IMPUTER_FILE), &model.preprocessor.imputer)?;
        write_json(&self.path(SCALER_FILE), &model.preprocessor.scaler)?;
        write_json(
            &self.path(FORECASTER_FILE),
            &ReturnModel::Linear(model.forecaster.clone()),
        )?;
        tracing::info!(dir = %self.root.display(), "Model artifacts written");
        Ok(())
    }

    pub fn save_clusters(&self, snapshot: &ClusterSnapshot) -> Result<()> {
        write_json(&self.path(CLUSTERS_FILE), snapshot)
    }

    pub fn save_classifier(&self, classifier: &CentroidClassifier) -> Result<()> {
        write_json(&self.path(CLASSIFIER_FILE), classifier)
    }

    pub fn load_preprocessor(&self) -> Result<Preprocessor> {
        let imputer: MedianImputer = read_json(&self.path(IMPUTER_FILE))?;
        let scaler: StandardScaler = read_json(&self.path(SCALER_FILE))?;
        if imputer.medians().len() != scaler.means().len() {
            bail!(
                "imputer has {} columns but scaler has {}",
                imputer.medians().len(),
                scaler.means().len()
            );
        }
        Ok(Preprocessor { imputer, scaler })
    }

    pub fn load_forecaster(&self) -> Result<ReturnModel> {
        let path = self.path(FORECASTER_FILE);
        let model: ReturnModel = read_json(&path)?;
        model
            .validate()
            .with_context(|| format!("invalid forecaster in {}", path.display()))?;
        Ok(model)
    }

    /// A centroid classifier wins over a cluster snapshot when both exist.
    pub fn load_bucket_source(&self) -> Result<BucketSource> {
        let classifier_path = self.path(CLASSIFIER_FILE);
        if classifier_path.exists() {
            let classifier: CentroidClassifier = read_json(&classifier_path)?;
            classifier
                .validate()
                .with_context(|| format!("invalid classifier in {}", classifier_path.display()))?;
            return Ok(BucketSource::Classifier(classifier));
        }
        let clusters_path = self.path(CLUSTERS_FILE);
        if clusters_path.exists() {
            let snapshot: ClusterSnapshot = read_json(&clusters_path)?;
            return Ok(BucketSource::Clusters {
                centroids: snapshot.centroids,
                assignments: snapshot.assignments,
            });
        }
        bail!(
            "no bucket artifact in {}: expected {} or {}",
            self.root.display(),
            CLASSIFIER_FILE,
            CLUSTERS_FILE
        )
    }

    /// Load every artifact once and build the read-only run context.
    pub fn load_context(&self) -> Result<PipelineContext> {
        let preprocessor = self.load_preprocessor()?;
        let forecaster = self.load_forecaster()?;
        let buckets = self.load_bucket_source()?;
        let ctx = PipelineContext::new(preprocessor, Box::new(forecaster), buckets)?;
        tracing::info!(
            dir = %self.root.display(),
            forecaster = ctx.forecaster().name(),
            "Artifacts loaded"
        );
        Ok(ctx)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&payload).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

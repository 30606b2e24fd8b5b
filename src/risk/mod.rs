//! Mapping of cluster ids or numeric scores to ordinal risk labels.

pub mod classifier;
pub mod labels;

use std::collections::BTreeMap;

pub use classifier::CentroidClassifier;
pub use labels::{
    assign_labels, assign_labels_with, centroids_from_members, label_from_score,
    labels_from_scores, BucketAssignment, ClusterCentroid, RiskBuckets,
};

use crate::error::Result;
use crate::model::feature_row::FeatureRow;
use crate::model::recommendation::RiskLabel;

/// Where a run gets its per-instrument risk labels from.
#[derive(Debug, Clone)]
pub enum BucketSource {
    /// Classify each instrument's latest row, then order the classifier's centroids.
    Classifier(CentroidClassifier),
    /// Cluster ids assigned elsewhere, with the centroids of that same fit.
    Clusters {
        centroids: Vec<ClusterCentroid>,
        assignments: BTreeMap<String, usize>,
    },
    /// Pre-scored instruments on a 1-10 scale.
    Scores(BTreeMap<String, i32>),
}

impl BucketSource {
    pub fn resolve(&self, latest: &[&FeatureRow]) -> Result<BTreeMap<String, RiskLabel>> {
        let labels = match self {
            Self::Classifier(clf) => {
                let assignments = clf.assign_rows(latest)?;
                assign_labels(&clf.raw_centroids(), &assignments)?.by_instrument
            }
            Self::Clusters {
                centroids,
                assignments,
            } => assign_labels(centroids, assignments)?.by_instrument,
            Self::Scores(scores) => labels_from_scores(scores),
        };
        Ok(labels)
    }
}

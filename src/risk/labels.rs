use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::feature_row::FeatureRow;
use crate::model::recommendation::RiskLabel;

/// A fitted cluster centre reduced to the coordinate used for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterCentroid {
    pub cluster_id: usize,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketAssignment<L> {
    pub by_instrument: BTreeMap<String, L>,
    pub by_cluster: BTreeMap<usize, L>,
}

pub type RiskBuckets = BucketAssignment<RiskLabel>;

/// Label clusters Low/Medium/High by ascending centroid volatility.
pub fn assign_labels(
    centroids: &[ClusterCentroid],
    assignments: &BTreeMap<String, usize>,
) -> Result<RiskBuckets> {
    assign_labels_with(centroids, assignments, &RiskLabel::ALL)
}

/// Order clusters by centroid volatility (ties by id) and hand out `tiers` in order.
///
/// The mapping depends only on the centroids passed in, so a refit model with
/// renumbered clusters still gets the same semantic labels. Instruments pointing
/// at an unknown cluster are logged and left out.
pub fn assign_labels_with<L: Copy>(
    centroids: &[ClusterCentroid],
    assignments: &BTreeMap<String, usize>,
    tiers: &[L],
) -> Result<BucketAssignment<L>> {
    if centroids.is_empty() {
        return Err(PipelineError::Artifact("no cluster centroids".to_string()));
    }
    if centroids.len() > tiers.len() {
        return Err(PipelineError::Artifact(format!(
            "{} clusters but only {} risk tiers",
            centroids.len(),
            tiers.len()
        )));
    }
    if let Some(c) = centroids.iter().find(|c| !c.volatility.is_finite()) {
        return Err(PipelineError::Artifact(format!(
            "cluster {} has non-finite volatility",
            c.cluster_id
        )));
    }

    let mut ordered: Vec<ClusterCentroid> = centroids.to_vec();
    ordered.sort_by(|a, b| {
        a.volatility
            .total_cmp(&b.volatility)
            .then(a.cluster_id.cmp(&b.cluster_id))
    });

    let mut by_cluster = BTreeMap::new();
    for (centroid, tier) in ordered.iter().zip(tiers.iter()) {
        if by_cluster.insert(centroid.cluster_id, *tier).is_some() {
            return Err(PipelineError::Artifact(format!(
                "duplicate cluster id {}",
                centroid.cluster_id
            )));
        }
    }

    let mut by_instrument = BTreeMap::new();
    for (ticker, cluster) in assignments {
        match by_cluster.get(cluster) {
            Some(label) => {
                by_instrument.insert(ticker.clone(), *label);
            }
            None => {
                tracing::warn!(ticker = %ticker, cluster, "Assignment to unknown cluster, skipping");
            }
        }
    }

    Ok(BucketAssignment {
        by_instrument,
        by_cluster,
    })
}

/// Centroid volatility as the mean `volatility_30` of each cluster's members.
///
/// Rows without an assignment are ignored. Clusters come back in id order.
pub fn centroids_from_members(
    rows: &[&FeatureRow],
    assignments: &BTreeMap<String, usize>,
) -> Vec<ClusterCentroid> {
    let mut sums: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(cluster) = assignments.get(&row.ticker) {
            let entry = sums.entry(*cluster).or_insert((0.0, 0));
            entry.0 += row.volatility_30;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(cluster_id, (sum, n))| ClusterCentroid {
            cluster_id,
            volatility: sum / n as f64,
        })
        .collect()
}

/// Questionnaire-style score mapping: `<= 3` Low, `4..=7` Medium, `>= 8` High.
pub fn label_from_score(score: i32) -> RiskLabel {
    if score <= 3 {
        RiskLabel::Low
    } else if score <= 7 {
        RiskLabel::Medium
    } else {
        RiskLabel::High
    }
}

pub fn labels_from_scores(scores: &BTreeMap<String, i32>) -> BTreeMap<String, RiskLabel> {
    scores
        .iter()
        .map(|(ticker, score)| (ticker.clone(), label_from_score(*score)))
        .collect()
}

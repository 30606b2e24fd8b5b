//! Positive-first top-N selection per risk bucket.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::model::recommendation::{Recommendation, RiskLabel};

/// One instrument's prediction, already placed in a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInstrument {
    pub ticker: String,
    pub risk_label: RiskLabel,
    pub predicted_return: f64,
}

impl ScoredInstrument {
    pub fn new(ticker: impl Into<String>, risk_label: RiskLabel, predicted_return: f64) -> Self {
        Self {
            ticker: ticker.into(),
            risk_label,
            predicted_return,
        }
    }
}

/// Descending by prediction, ticker ascending on exact ties.
fn by_prediction_desc(a: &ScoredInstrument, b: &ScoredInstrument) -> Ordering {
    b.predicted_return
        .total_cmp(&a.predicted_return)
        .then_with(|| a.ticker.cmp(&b.ticker))
}

/// Pick up to `n` rows labelled `label`.
///
/// Positive predictions are chosen first; if fewer than `n` exist the best
/// non-positive rows fill the remainder. The result is ranked by raw prediction
/// (1-based), so a selected positive never ranks below a backfilled row.
pub fn select_top_n(rows: &[ScoredInstrument], label: RiskLabel, n: usize) -> Vec<Recommendation> {
    let (mut positive, mut rest): (Vec<&ScoredInstrument>, Vec<&ScoredInstrument>) = rows
        .iter()
        .filter(|r| r.risk_label == label && !r.predicted_return.is_nan())
        .partition(|r| r.predicted_return > 0.0);
    let available = positive.len() + rest.len();

    positive.sort_by(|a, b| by_prediction_desc(a, b));
    rest.sort_by(|a, b| by_prediction_desc(a, b));

    let mut chosen: Vec<&ScoredInstrument> = positive.into_iter().take(n).collect();
    let backfill = n.saturating_sub(chosen.len());
    chosen.extend(rest.into_iter().take(backfill));
    chosen.sort_by(|a, b| by_prediction_desc(a, b));

    if available < n {
        let underflow = PipelineError::BucketUnderflow {
            label,
            available,
            requested: n,
        };
        tracing::info!(bucket = %label, available, requested = n, "{}", underflow);
    }

    chosen
        .into_iter()
        .enumerate()
        .map(|(i, r)| Recommendation {
            ticker: r.ticker.clone(),
            risk_label: label,
            predicted_return: r.predicted_return,
            rank: i + 1,
        })
        .collect()
}

/// [`select_top_n`] for every tier, concatenated Low, Medium, High.
pub fn select_all_buckets(rows: &[ScoredInstrument], n: usize) -> Vec<Recommendation> {
    RiskLabel::ALL
        .iter()
        .flat_map(|label| select_top_n(rows, *label, n))
        .collect()
}

/// Bucket sizes, useful for reporting underflow up front.
pub fn bucket_sizes(rows: &[ScoredInstrument]) -> BTreeMap<RiskLabel, usize> {
    let mut sizes: BTreeMap<RiskLabel, usize> = RiskLabel::ALL.iter().map(|l| (*l, 0)).collect();
    for r in rows {
        *sizes.entry(r.risk_label).or_insert(0) += 1;
    }
    sizes
}

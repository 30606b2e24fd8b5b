use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 3;
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["volatility_30", "momentum_30", "beta_60"];

/// Model input in column order of [`FEATURE_NAMES`]; `None` marks a missing value.
pub type FeatureVector = [Option<f64>; FEATURE_COUNT];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub ticker: String,
    /// Trading-day index into the instrument's price series.
    pub as_of_index: usize,
    pub as_of: NaiveDate,
    pub volatility_30: f64,
    pub momentum_30: f64,
    pub beta_60: Option<f64>,
    /// Absent on latest-snapshot rows and on history rows too close to the end.
    pub forward_return: Option<f64>,
}

impl FeatureRow {
    pub fn feature_vector(&self) -> FeatureVector {
        [Some(self.volatility_30), Some(self.momentum_30), self.beta_60]
    }

    /// Training rows need the target and a complete feature vector.
    pub fn is_training_eligible(&self) -> bool {
        self.forward_return.is_some() && self.beta_60.is_some()
    }
}

/// Feature rows for a whole universe, ordered by `(ticker, as_of_index)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn from_rows(mut rows: Vec<FeatureRow>) -> Self {
        rows.sort_by(|a, b| {
            a.ticker
                .cmp(&b.ticker)
                .then(a.as_of_index.cmp(&b.as_of_index))
        });
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn training_rows(&self) -> Vec<&FeatureRow> {
        self.rows.iter().filter(|r| r.is_training_eligible()).collect()
    }

    /// Most recent row per ticker, in ticker order.
    pub fn latest_rows(&self) -> Vec<&FeatureRow> {
        let mut latest: BTreeMap<&str, &FeatureRow> = BTreeMap::new();
        for row in &self.rows {
            latest.insert(row.ticker.as_str(), row);
        }
        latest.into_values().collect()
    }

    pub fn tickers(&self) -> Vec<String> {
        let mut out: Vec<String> = self.rows.iter().map(|r| r.ticker.clone()).collect();
        out.dedup();
        out
    }

    pub fn into_rows(self) -> Vec<FeatureRow> {
        self.rows
    }
}

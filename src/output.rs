//! Flat, serializable views of run results, with CSV and JSON writers.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::feature_row::FeatureTable;
use crate::model::recommendation::{Recommendation, RiskLabel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRow {
    pub ticker: String,
    pub risk_label: RiskLabel,
    pub predicted_return: f64,
    pub rank: usize,
}

impl From<&Recommendation> for RecommendationRow {
    fn from(r: &Recommendation) -> Self {
        Self {
            ticker: r.ticker.clone(),
            risk_label: r.risk_label,
            predicted_return: r.predicted_return,
            rank: r.rank,
        }
    }
}

/// One feature row keyed by `(ticker, as_of_index)`; missing values serialize empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTableRow {
    pub ticker: String,
    pub as_of_index: usize,
    pub as_of: String,
    pub volatility_30: f64,
    pub momentum_30: f64,
    pub beta_60: Option<f64>,
    pub forward_return: Option<f64>,
}

pub fn recommendation_rows(recs: &[Recommendation]) -> Vec<RecommendationRow> {
    recs.iter().map(RecommendationRow::from).collect()
}

/// The picks of a single bucket, already in rank order.
pub fn rows_for_bucket(recs: &[Recommendation], label: RiskLabel) -> Vec<RecommendationRow> {
    recs.iter()
        .filter(|r| r.risk_label == label)
        .map(RecommendationRow::from)
        .collect()
}

pub fn feature_table_rows(table: &FeatureTable) -> Vec<FeatureTableRow> {
    table
        .rows()
        .iter()
        .map(|r| FeatureTableRow {
            ticker: r.ticker.clone(),
            as_of_index: r.as_of_index,
            as_of: r.as_of.format("%Y-%m-%d").to_string(),
            volatility_30: r.volatility_30,
            momentum_30: r.momentum_30,
            beta_60: r.beta_60,
            forward_return: r.forward_return,
        })
        .collect()
}

pub fn write_recommendations_csv<W: Write>(writer: W, recs: &[Recommendation]) -> Result<()> {
    write_csv(writer, &recommendation_rows(recs))
}

pub fn write_feature_table_csv<W: Write>(writer: W, table: &FeatureTable) -> Result<()> {
    write_csv(writer, &feature_table_rows(table))
}

pub fn recommendations_json(recs: &[Recommendation]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&recommendation_rows(recs))?)
}

fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

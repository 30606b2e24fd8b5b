//! CSV readers for price history and externally fit cluster assignments.

use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::model::price_series::{PricePoint, PriceSeries, PriceSeriesStore};

#[derive(Debug, Deserialize)]
struct PriceRecord {
    ticker: String,
    date: String,
    close: f64,
}

#[derive(Debug, Deserialize)]
struct AssignmentRecord {
    ticker: String,
    cluster: usize,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

/// Read long-format `ticker,date,close` rows into a store.
///
/// Rows with an unparseable date are skipped; so are instruments whose series
/// is invalid (e.g. duplicate dates). A missing benchmark is an error.
pub fn read_price_csv<R: Read>(reader: R, benchmark: &str) -> Result<PriceSeriesStore> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut grouped: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
    for record in csv_reader.deserialize::<PriceRecord>() {
        let record = record?;
        let Some(date) = parse_date(&record.date) else {
            tracing::warn!(ticker = %record.ticker, date = %record.date, "Unparseable date, skipping row");
            continue;
        };
        grouped
            .entry(record.ticker.trim().to_ascii_uppercase())
            .or_default()
            .push(PricePoint::new(date, record.close));
    }

    let benchmark_key = benchmark.trim().to_ascii_uppercase();
    let benchmark_points = grouped.remove(&benchmark_key).ok_or_else(|| {
        PipelineError::EmptyDataset(format!("benchmark {} not present in price data", benchmark_key))
    })?;
    let mut store = PriceSeriesStore::new(PriceSeries::from_unsorted(
        benchmark_key,
        benchmark_points,
    )?);

    for (ticker, points) in grouped {
        match PriceSeries::from_unsorted(ticker.as_str(), points) {
            Ok(series) => {
                store.insert(series);
            }
            Err(e) => tracing::warn!(ticker = %ticker, error = %e, "Skipping instrument"),
        }
    }
    tracing::info!(
        instruments = store.len(),
        benchmark = %store.benchmark().ticker(),
        benchmark_points = store.benchmark().len(),
        "Price data loaded"
    );
    Ok(store)
}

/// Read `ticker,cluster` rows. A repeated ticker keeps its last assignment.
pub fn read_assignments_csv<R: Read>(reader: R) -> Result<BTreeMap<String, usize>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = BTreeMap::new();
    for record in csv_reader.deserialize::<AssignmentRecord>() {
        let record = record?;
        out.insert(record.ticker.trim().to_ascii_uppercase(), record.cluster);
    }
    Ok(out)
}

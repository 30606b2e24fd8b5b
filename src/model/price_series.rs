use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Time-ordered closes for one instrument.
///
/// Dates are strictly increasing and every close is finite and positive, so a
/// simple return exists between any two consecutive observations. Windows over
/// the series count observations (trading days), not calendar days.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build from points already in date order.
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Result<Self> {
        let ticker = ticker.into().trim().to_ascii_uppercase();
        for p in &points {
            if !p.close.is_finite() || p.close <= 0.0 {
                return Err(PipelineError::InvalidSeries {
                    ticker,
                    reason: format!("non-positive or non-finite close {} on {}", p.close, p.date),
                });
            }
        }
        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(PipelineError::InvalidSeries {
                ticker,
                reason: format!("dates not strictly increasing at {} -> {}", w[0].date, w[1].date),
            });
        }
        Ok(Self { ticker, points })
    }

    /// Build from points in any order. Duplicate dates are still rejected.
    pub fn from_unsorted(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Result<Self> {
        points.sort_by_key(|p| p.date);
        Self::new(ticker, points)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn close(&self, index: usize) -> Option<f64> {
        self.points.get(index).map(|p| p.close)
    }

    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.points.get(index).map(|p| p.date)
    }

    /// `close[i] / close[i-1] - 1`; undefined at index 0.
    pub fn simple_return(&self, index: usize) -> Option<f64> {
        if index == 0 {
            return None;
        }
        let prev = self.close(index - 1)?;
        let cur = self.close(index)?;
        Some(cur / prev - 1.0)
    }

    /// Returns keyed by the date of the later observation.
    pub fn returns_by_date(&self) -> BTreeMap<NaiveDate, f64> {
        (1..self.points.len())
            .filter_map(|i| Some((self.points[i].date, self.simple_return(i)?)))
            .collect()
    }
}

/// One run's price inputs: every instrument plus the benchmark.
#[derive(Debug, Clone)]
pub struct PriceSeriesStore {
    benchmark: PriceSeries,
    instruments: BTreeMap<String, PriceSeries>,
}

impl PriceSeriesStore {
    pub fn new(benchmark: PriceSeries) -> Self {
        Self {
            benchmark,
            instruments: BTreeMap::new(),
        }
    }

    /// Insert or replace an instrument series, returning the previous one.
    pub fn insert(&mut self, series: PriceSeries) -> Option<PriceSeries> {
        self.instruments.insert(series.ticker().to_string(), series)
    }

    pub fn benchmark(&self) -> &PriceSeries {
        &self.benchmark
    }

    pub fn get(&self, ticker: &str) -> Option<&PriceSeries> {
        self.instruments.get(&ticker.trim().to_ascii_uppercase())
    }

    /// Instruments in ticker order.
    pub fn instruments(&self) -> impl Iterator<Item = &PriceSeries> {
        self.instruments.values()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.instruments.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

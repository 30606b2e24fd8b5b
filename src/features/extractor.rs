use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{ExtractionMode, WindowParams};
use crate::error::{PipelineError, Result};
use crate::indicator::rolling::{RollingPairWindow, RollingWindow};
use crate::model::feature_row::FeatureRow;
use crate::model::price_series::PriceSeries;

/// Benchmark simple returns keyed by date, computed once per run.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkReturns {
    by_date: BTreeMap<NaiveDate, f64>,
}

impl BenchmarkReturns {
    pub fn from_series(benchmark: &PriceSeries) -> Self {
        Self {
            by_date: benchmark.returns_by_date(),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.by_date.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

/// Extract feature rows, treating a short series as "no rows".
///
/// Use [`try_extract`] when the caller needs to know why nothing came back.
pub fn extract(
    series: &PriceSeries,
    benchmark: &BenchmarkReturns,
    params: &WindowParams,
    mode: ExtractionMode,
) -> Vec<FeatureRow> {
    match try_extract(series, benchmark, params, mode) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(ticker = %series.ticker(), error = %e, "Skipping instrument");
            Vec::new()
        }
    }
}

/// Walk the series once, advancing the rolling buffers at every step and
/// emitting a row at each eligible window end.
///
/// Returns [`PipelineError::Config`] for unusable window parameters and
/// [`PipelineError::InsufficientHistory`] when the series is too short for
/// `mode`. Per-row gaps (e.g. an undefined beta) never fail the call: the
/// row is kept with the field missing.
pub fn try_extract(
    series: &PriceSeries,
    benchmark: &BenchmarkReturns,
    params: &WindowParams,
    mode: ExtractionMode,
) -> Result<Vec<FeatureRow>> {
    params.validate()?;
    let n = series.len();
    let required = params.required_observations(mode);
    if n < required || n == 0 {
        return Err(PipelineError::InsufficientHistory {
            ticker: series.ticker().to_string(),
            observations: n,
            required,
        });
    }

    let points = series.points();
    let first = params.first_index();
    let last = n - 1;

    let mut vol_window = RollingWindow::new(params.volatility_window);
    let mut beta_window = RollingPairWindow::new(params.beta_window);
    let mut rows = Vec::new();

    for i in 1..n {
        let Some(ret) = series.simple_return(i) else {
            continue;
        };
        vol_window.push(ret);
        if let Some(bench) = benchmark.get(points[i].date) {
            beta_window.push(ret, bench);
        }

        if i < first || (mode == ExtractionMode::Latest && i != last) {
            continue;
        }

        let Some(volatility) = vol_window.std_dev() else {
            log_alignment(series, i, "volatility window not full");
            continue;
        };
        let Some(base) = i
            .checked_sub(params.momentum_window)
            .map(|j| points[j].close)
        else {
            log_alignment(series, i, "momentum base index out of range");
            continue;
        };
        let momentum = points[i].close / base - 1.0;

        let beta = beta_window.slope();
        if beta.is_none() {
            let reason = if beta_window.is_ready() {
                "zero benchmark variance"
            } else {
                "fewer joined benchmark observations than the beta window"
            };
            log_alignment(series, i, reason);
        }

        let forward_return = match mode {
            ExtractionMode::History => points
                .get(i + params.lookahead_days)
                .map(|future| future.close / points[i].close - 1.0),
            ExtractionMode::Latest => None,
        };

        rows.push(FeatureRow {
            ticker: series.ticker().to_string(),
            as_of_index: i,
            as_of: points[i].date,
            volatility_30: volatility,
            momentum_30: momentum,
            beta_60: beta,
            forward_return,
        });
    }

    Ok(rows)
}

fn log_alignment(series: &PriceSeries, index: usize, reason: &str) {
    let err = PipelineError::FeatureAlignment {
        ticker: series.ticker().to_string(),
        as_of_index: index,
        reason: reason.to_string(),
    };
    tracing::debug!(error = %err, "Feature field undefined");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::price_series::PricePoint;

    fn series(ticker: &str, closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let pts = closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(start + chrono::Days::new(i as u64), *c))
            .collect();
        PriceSeries::new(ticker, pts).unwrap()
    }

    fn small_params() -> WindowParams {
        WindowParams {
            volatility_window: 3,
            momentum_window: 3,
            beta_window: 4,
            lookahead_days: 2,
            min_history_days: 5,
        }
    }

    #[test]
    fn short_series_is_insufficient_history() {
        let s = series("A", &[1.0, 2.0, 3.0]);
        let bench = BenchmarkReturns::from_series(&s);
        let err = try_extract(&s, &bench, &small_params(), ExtractionMode::Latest).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientHistory { required: 5, .. }));
        assert!(extract(&s, &bench, &small_params(), ExtractionMode::Latest).is_empty());
    }

    #[test]
    fn history_rows_start_at_first_index_and_carry_forward_returns() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let s = series("A", &closes);
        let bench = BenchmarkReturns::default();
        let rows = try_extract(&s, &bench, &small_params(), ExtractionMode::History).unwrap();
        assert_eq!(rows.first().unwrap().as_of_index, 4);
        assert_eq!(rows.last().unwrap().as_of_index, 9);
        let r4 = &rows[0];
        assert!((r4.momentum_30 - (104.0 / 101.0 - 1.0)).abs() < 1e-12);
        assert!((r4.forward_return.unwrap() - (106.0 / 104.0 - 1.0)).abs() < 1e-12);
        assert!(rows.iter().rev().take(2).all(|r| r.forward_return.is_none()));
        assert!(rows.iter().all(|r| r.beta_60.is_none()));
    }

    #[test]
    fn latest_mode_emits_only_final_index() {
        let closes: Vec<f64> = (0..8).map(|i| 50.0 * (1.0 + 0.01 * i as f64)).collect();
        let s = series("A", &closes);
        let bench = BenchmarkReturns::default();
        let rows = try_extract(&s, &bench, &small_params(), ExtractionMode::Latest).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_of_index, 7);
        assert_eq!(rows[0].forward_return, None);
    }

    #[test]
    fn beta_uses_only_joined_dates() {
        let closes = [100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 104.0, 105.0];
        let s = series("A", &closes);
        // benchmark moves exactly half as much on every date
        let mut b = vec![200.0];
        for w in closes.windows(2) {
            let r = w[1] / w[0] - 1.0;
            let prev = *b.last().unwrap();
            b.push(prev * (1.0 + r / 2.0));
        }
        let bench_series = series("SPY", &b);
        let bench = BenchmarkReturns::from_series(&bench_series);
        let rows = try_extract(&s, &bench, &small_params(), ExtractionMode::Latest).unwrap();
        assert!((rows[0].beta_60.unwrap() - 2.0).abs() < 1e-9);
    }
}

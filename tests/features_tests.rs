use std::sync::Arc;

use chrono::{Days, NaiveDate};
use risk_picks::error::PipelineError;
use risk_picks::features::{
    extract, extract_universe, extract_universe_concurrent, try_extract, BenchmarkReturns,
    ExtractionMode, WindowParams,
};
use risk_picks::indicator::rolling::RollingWindow;
use risk_picks::model::price_series::{PricePoint, PriceSeries, PriceSeriesStore};

const EPS: f64 = 1e-9;

fn series(ticker: &str, closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
    let points = closes
        .iter()
        .enumerate()
        .map(|(i, c)| PricePoint::new(start + Days::new(i as u64), *c))
        .collect();
    PriceSeries::new(ticker, points).unwrap()
}

fn geometric(n: usize, start: f64, growth: f64) -> Vec<f64> {
    (0..n).map(|i| start * growth.powi(i as i32)).collect()
}

fn flat(n: usize, level: f64) -> Vec<f64> {
    vec![level; n]
}

fn three_instrument_store() -> PriceSeriesStore {
    let mut store = PriceSeriesStore::new(series("SPY", &flat(200, 400.0)));
    store.insert(series("RISE", &geometric(200, 100.0, 1.01)));
    store.insert(series("FLAT", &flat(200, 50.0)));
    store.insert(series("FALL", &geometric(200, 100.0, 0.99)));
    store
}

#[test]
fn synthetic_universe_matches_hand_computed_windows() {
    let store = three_instrument_store();
    let params = WindowParams::default();
    let out = extract_universe(&store, &params, ExtractionMode::History).unwrap();
    assert!(out.skipped.is_empty());

    // 200 points: window ends 59..=199, forward returns only up to 199 - 90.
    for ticker in ["FALL", "FLAT", "RISE"] {
        let rows: Vec<_> = out.table.rows().iter().filter(|r| r.ticker == ticker).collect();
        assert_eq!(rows.len(), 141);
        assert_eq!(rows[0].as_of_index, 59);
        assert_eq!(rows.last().unwrap().as_of_index, 199);
        assert_eq!(rows.iter().filter(|r| r.forward_return.is_some()).count(), 51);
        // flat benchmark: zero variance, beta undefined everywhere
        assert!(rows.iter().all(|r| r.beta_60.is_none()));
        // constant per-step returns: zero volatility
        assert!(rows.iter().all(|r| r.volatility_30.abs() < EPS));
    }

    let rise = out.table.rows().iter().find(|r| r.ticker == "RISE").unwrap();
    assert!((rise.momentum_30 - (1.01f64.powi(30) - 1.0)).abs() < EPS);
    assert!((rise.forward_return.unwrap() - (1.01f64.powi(90) - 1.0)).abs() < EPS);

    let fall = out.table.rows().iter().find(|r| r.ticker == "FALL").unwrap();
    assert!((fall.momentum_30 - (0.99f64.powi(30) - 1.0)).abs() < EPS);
    assert!((fall.forward_return.unwrap() - (0.99f64.powi(90) - 1.0)).abs() < EPS);

    let flat_row = out.table.rows().iter().find(|r| r.ticker == "FLAT").unwrap();
    assert!(flat_row.momentum_30.abs() < EPS);
    assert!(flat_row.forward_return.unwrap().abs() < EPS);

    // none of them is trainable without a beta
    assert!(out.table.training_rows().is_empty());
}

#[test]
fn latest_mode_emits_one_row_per_instrument() {
    let store = three_instrument_store();
    let out = extract_universe(&store, &WindowParams::default(), ExtractionMode::Latest).unwrap();
    assert_eq!(out.table.len(), 3);
    assert_eq!(out.table.tickers(), vec!["FALL", "FLAT", "RISE"]);
    assert!(out
        .table
        .rows()
        .iter()
        .all(|r| r.as_of_index == 199 && r.forward_return.is_none()));
}

#[test]
fn series_shorter_than_min_history_yields_no_rows() {
    let s = series("TINY", &geometric(59, 10.0, 1.001));
    let bench = BenchmarkReturns::from_series(&series("SPY", &geometric(59, 10.0, 1.002)));
    let params = WindowParams::default();
    assert!(extract(&s, &bench, &params, ExtractionMode::Latest).is_empty());
    assert!(matches!(
        try_extract(&s, &bench, &params, ExtractionMode::Latest),
        Err(PipelineError::InsufficientHistory {
            observations: 59,
            required: 60,
            ..
        })
    ));
}

#[test]
fn zero_width_windows_are_config_errors() {
    let s = series("ANY", &geometric(200, 10.0, 1.001));
    let bench = BenchmarkReturns::from_series(&series("SPY", &geometric(200, 10.0, 1.002)));
    for params in [
        WindowParams {
            volatility_window: 0,
            ..WindowParams::default()
        },
        WindowParams {
            beta_window: 0,
            ..WindowParams::default()
        },
    ] {
        assert!(matches!(
            try_extract(&s, &bench, &params, ExtractionMode::History),
            Err(PipelineError::Config(_))
        ));
        assert!(extract(&s, &bench, &params, ExtractionMode::Latest).is_empty());
    }
}

#[test]
fn history_mode_needs_lookahead_on_top_of_min_history() {
    let s = series("MID", &geometric(149, 10.0, 1.001));
    let bench = BenchmarkReturns::default();
    let params = WindowParams::default();
    assert!(extract(&s, &bench, &params, ExtractionMode::History).is_empty());
    assert_eq!(extract(&s, &bench, &params, ExtractionMode::Latest).len(), 1);
}

#[test]
fn twenty_nine_returns_never_produce_volatility() {
    let mut w = RollingWindow::new(30);
    for i in 0..29 {
        w.push(0.01 * i as f64);
    }
    assert_eq!(w.std_dev(), None);
    w.push(0.5);
    assert!(w.std_dev().is_some());

    // 30 prices carry only 29 returns: no row can exist even with a short momentum window.
    let params = WindowParams {
        volatility_window: 30,
        momentum_window: 5,
        beta_window: 60,
        lookahead_days: 1,
        min_history_days: 31,
    };
    params.validate().unwrap();
    let s = series("A", &geometric(30, 20.0, 1.003));
    assert!(extract(&s, &BenchmarkReturns::default(), &params, ExtractionMode::Latest).is_empty());
    let s = series("A", &geometric(31, 20.0, 1.003));
    assert_eq!(
        extract(&s, &BenchmarkReturns::default(), &params, ExtractionMode::Latest).len(),
        1
    );
}

#[test]
fn beta_needs_a_full_window_of_joined_dates() {
    let closes: Vec<f64> = (0..120)
        .map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.1)
        .collect();
    let bench_closes: Vec<f64> = (0..120)
        .map(|i| 300.0 + (i as f64 * 0.7).sin() * 4.0)
        .collect();
    let s = series("A", &closes);

    // Benchmark only covers the last 60 dates: 59 joined returns.
    let start = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
    let partial: Vec<PricePoint> = (60..120)
        .map(|i| PricePoint::new(start + Days::new(i as u64), bench_closes[i]))
        .collect();
    let bench = BenchmarkReturns::from_series(&PriceSeries::new("SPY", partial).unwrap());
    assert_eq!(bench.len(), 59);
    let params = WindowParams::default();
    let rows = try_extract(&s, &bench, &params, ExtractionMode::Latest).unwrap();
    assert_eq!(rows[0].beta_60, None);

    // Full overlap: defined and equal to cov/var over the last 60 joined returns.
    let full = series("SPY", &bench_closes);
    let bench = BenchmarkReturns::from_series(&full);
    let rows = try_extract(&s, &bench, &params, ExtractionMode::Latest).unwrap();
    let x: Vec<f64> = (60..120).map(|i| closes[i] / closes[i - 1] - 1.0).collect();
    let y: Vec<f64> = (60..120)
        .map(|i| bench_closes[i] / bench_closes[i - 1] - 1.0)
        .collect();
    let mx = x.iter().sum::<f64>() / 60.0;
    let my = y.iter().sum::<f64>() / 60.0;
    let cov: f64 = x.iter().zip(&y).map(|(a, b)| (a - mx) * (b - my)).sum::<f64>() / 59.0;
    let var: f64 = y.iter().map(|b| (b - my).powi(2)).sum::<f64>() / 59.0;
    assert!((rows[0].beta_60.unwrap() - cov / var).abs() < 1e-9);
}

#[test]
fn windows_count_observations_not_calendar_days() {
    // Weekly spacing: same closes, same features as daily spacing.
    let closes = geometric(80, 30.0, 1.002);
    let start = NaiveDate::from_ymd_opt(2020, 1, 6).unwrap();
    let weekly: Vec<PricePoint> = closes
        .iter()
        .enumerate()
        .map(|(i, c)| PricePoint::new(start + Days::new(7 * i as u64), *c))
        .collect();
    let weekly = PriceSeries::new("W", weekly).unwrap();
    let daily = series("W", &closes);
    let params = WindowParams::default();
    let a = extract(&weekly, &BenchmarkReturns::default(), &params, ExtractionMode::Latest);
    let b = extract(&daily, &BenchmarkReturns::default(), &params, ExtractionMode::Latest);
    assert_eq!(a[0].momentum_30, b[0].momentum_30);
    assert_eq!(a[0].volatility_30, b[0].volatility_30);
}

#[test]
fn universe_with_no_eligible_instrument_is_empty_dataset() {
    let mut store = PriceSeriesStore::new(series("SPY", &flat(20, 1.0)));
    store.insert(series("A", &flat(20, 2.0)));
    let err = extract_universe(&store, &WindowParams::default(), ExtractionMode::Latest)
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDataset(_)));
}

#[test]
fn short_instruments_are_skipped_not_fatal() {
    let mut store = three_instrument_store();
    store.insert(series("NEW", &geometric(40, 5.0, 1.01)));
    let out = extract_universe(&store, &WindowParams::default(), ExtractionMode::Latest).unwrap();
    assert_eq!(out.table.len(), 3);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].ticker, "NEW");
}

#[tokio::test]
async fn concurrent_extraction_matches_sequential() {
    let mut store = three_instrument_store();
    store.insert(series("NEW", &geometric(40, 5.0, 1.01)));
    let params = WindowParams::default();
    let sequential = extract_universe(&store, &params, ExtractionMode::History).unwrap();
    let concurrent =
        extract_universe_concurrent(Arc::new(store), params, ExtractionMode::History)
            .await
            .unwrap();
    assert_eq!(sequential.table, concurrent.table);
    assert_eq!(sequential.skipped.len(), concurrent.skipped.len());
}

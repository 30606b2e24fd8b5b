use std::fmt::Write as _;
use std::path::Path;

use chrono::{Days, NaiveDate};
use risk_picks::artifacts::{CLUSTERS_FILE, FORECASTER_FILE, IMPUTER_FILE, SCALER_FILE};
use risk_picks::cli::run_cli;
use risk_picks::config::Config;

fn args(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn write_prices(path: &Path) {
    let start = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    let mut out = String::from("ticker,date,close\n");
    let tickers = ["SPY", "KO", "MSFT", "TSLA", "PG"];
    for (k, ticker) in tickers.iter().enumerate() {
        let mut close = 100.0 + 20.0 * k as f64;
        for t in 0..180usize {
            if t > 0 {
                let market = 0.003 * (t as f64 * 0.4).sin();
                let own = 0.002 * (k as f64 + 1.0) * (t as f64 * (0.13 + 0.07 * k as f64)).cos();
                close *= 1.0 + market * (0.5 + 0.3 * k as f64) + own;
            }
            let date = start + Days::new(t as u64);
            writeln!(out, "{},{},{:.6}", ticker, date.format("%Y-%m-%d"), close).unwrap();
        }
    }
    std::fs::write(path, out).unwrap();
}

fn config_for(dir: &Path) -> Config {
    let mut config = Config::from_toml_str("[pipeline]\nconcurrent_extraction = false\n").unwrap();
    config.artifacts.dir = dir.join("artifacts");
    config
}

#[tokio::test]
async fn train_then_recommend_from_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let prices = dir.path().join("prices.csv");
    let assignments = dir.path().join("clusters.csv");
    write_prices(&prices);
    std::fs::write(&assignments, "ticker,cluster\nKO,2\nPG,2\nMSFT,0\nTSLA,1\n").unwrap();
    let config = config_for(dir.path());

    run_cli(
        &args(&[
            "train",
            prices.to_str().unwrap(),
            assignments.to_str().unwrap(),
        ]),
        &config,
    )
    .await
    .unwrap();
    for file in [IMPUTER_FILE, SCALER_FILE, FORECASTER_FILE, CLUSTERS_FILE] {
        assert!(config.artifacts.dir.join(file).exists(), "{} missing", file);
    }

    run_cli(&args(&["recommend", prices.to_str().unwrap()]), &config)
        .await
        .unwrap();
    run_cli(
        &args(&["recommend", prices.to_str().unwrap(), "--bucket", "low", "--json"]),
        &config,
    )
    .await
    .unwrap();
    run_cli(
        &args(&["features", prices.to_str().unwrap(), "--history"]),
        &config,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn recommend_without_artifacts_fails() {
    let dir = tempfile::tempdir().unwrap();
    let prices = dir.path().join("prices.csv");
    write_prices(&prices);
    let config = config_for(dir.path());
    assert!(run_cli(&args(&["recommend", prices.to_str().unwrap()]), &config)
        .await
        .is_err());
}

#[tokio::test]
async fn bucket_for_score_validates_range() {
    let config = Config::from_toml_str("").unwrap();
    assert!(run_cli(&args(&["bucket-for-score", "7"]), &config).await.is_ok());
    assert!(run_cli(&args(&["bucket-for-score", "0"]), &config).await.is_err());
    assert!(run_cli(&args(&["bucket-for-score", "11"]), &config).await.is_err());
    assert!(run_cli(&args(&["bucket-for-score", "x"]), &config).await.is_err());
}

#[tokio::test]
async fn unknown_subcommand_and_missing_arguments_fail() {
    let config = Config::from_toml_str("").unwrap();
    assert!(run_cli(&args(&["serve"]), &config).await.is_err());
    assert!(run_cli(&args(&["train"]), &config).await.is_err());
    assert!(run_cli(&args(&[]), &config).await.is_err());
}

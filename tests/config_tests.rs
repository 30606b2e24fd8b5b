use std::path::{Path, PathBuf};

use risk_picks::config::Config;
use risk_picks::features::WindowParams;

#[test]
fn shipped_default_config_is_valid() {
    let config = Config::load_from_path(Path::new("config/default.toml")).unwrap();
    assert_eq!(config.pipeline.window_params(), WindowParams::default());
    assert_eq!(config.pipeline.top_n, 5);
    assert_eq!(config.pipeline.benchmark, "SPY");
    assert!(config.pipeline.concurrent_extraction);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file, PathBuf::from("risk-picks.log"));
}

#[test]
fn load_from_file_with_custom_windows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(
        &path,
        r#"
[pipeline]
lookahead_days = 20
min_history_days = 25
top_n = 3
volatility_window = 10
momentum_window = 20
beta_window = 40
concurrent_extraction = false
benchmark = "QQQ"

[artifacts]
dir = "models/qqq"
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    let run = config.pipeline.run_params();
    assert_eq!(run.top_n, 3);
    assert!(!run.concurrent);
    assert_eq!(run.windows.momentum_window, 20);
    assert_eq!(run.windows.first_index(), 24);
    assert_eq!(config.pipeline.benchmark, "QQQ");
}

#[test]
fn empty_file_falls_back_to_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.pipeline.lookahead_days, 90);
    assert_eq!(config.pipeline.min_history_days, 60);
    assert_eq!(config.artifacts.dir, PathBuf::from("artifacts"));
}

#[test]
fn invalid_settings_are_rejected() {
    assert!(Config::from_toml_str("[pipeline]\nbeta_window = 0\n").is_err());
    assert!(Config::from_toml_str("[pipeline]\nlookahead_days = 0\n").is_err());
    assert!(Config::from_toml_str("[pipeline]\nbenchmark = \"  \"\n").is_err());
    assert!(Config::from_toml_str("[pipeline]\ntop_n = \"five\"\n").is_err());
}

#[test]
fn missing_file_reports_path() {
    let err = Config::load_from_path(Path::new("does/not/exist.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("does/not/exist.toml"));
}

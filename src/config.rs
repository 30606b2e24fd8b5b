use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::features::WindowParams;
use crate::pipeline::RunParams;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lookahead_days: usize,
    pub min_history_days: usize,
    pub top_n: usize,
    pub volatility_window: usize,
    pub momentum_window: usize,
    pub beta_window: usize,
    pub concurrent_extraction: bool,
    pub benchmark: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let windows = WindowParams::default();
        Self {
            lookahead_days: windows.lookahead_days,
            min_history_days: windows.min_history_days,
            top_n: 5,
            volatility_window: windows.volatility_window,
            momentum_window: windows.momentum_window,
            beta_window: windows.beta_window,
            concurrent_extraction: true,
            benchmark: "SPY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: PathBuf::from("risk-picks.log"),
        }
    }
}

impl PipelineConfig {
    pub fn window_params(&self) -> WindowParams {
        WindowParams {
            volatility_window: self.volatility_window,
            momentum_window: self.momentum_window,
            beta_window: self.beta_window,
            lookahead_days: self.lookahead_days,
            min_history_days: self.min_history_days,
        }
    }

    pub fn run_params(&self) -> RunParams {
        RunParams {
            windows: self.window_params(),
            top_n: self.top_n,
            concurrent: self.concurrent_extraction,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            bail!("pipeline.top_n must be > 0");
        }
        if self.benchmark.trim().is_empty() {
            bail!("pipeline.benchmark must not be empty");
        }
        self.window_params()
            .validate()
            .context("pipeline window settings are invalid")?;
        Ok(())
    }
}

impl Config {
    /// Load `.env`, then the TOML file named by `RISK_PICKS_CONFIG` (or the default path).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("RISK_PICKS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        if let Ok(dir) = std::env::var("RISK_PICKS_ARTIFACT_DIR") {
            if !dir.trim().is_empty() {
                config.artifacts.dir = PathBuf::from(dir);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).context("invalid TOML configuration")?;
        config.pipeline.validate()?;
        Ok(config)
    }
}

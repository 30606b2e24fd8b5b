//! Rolling volatility / momentum / beta / forward-return features.
//!
//! One extraction pass owns its rolling buffers; nothing is carried across
//! instruments or runs. Windows count trading-day observations.

pub mod extractor;
pub mod universe;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub use extractor::{extract, try_extract, BenchmarkReturns};
pub use universe::{
    extract_universe, extract_universe_concurrent, SkippedInstrument, UniverseExtraction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Every valid window end, with forward returns where the future exists.
    History,
    /// Only the final index; no forward return.
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowParams {
    pub volatility_window: usize,
    pub momentum_window: usize,
    pub beta_window: usize,
    pub lookahead_days: usize,
    pub min_history_days: usize,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            volatility_window: 30,
            momentum_window: 30,
            beta_window: 60,
            lookahead_days: 90,
            min_history_days: 60,
        }
    }
}

impl WindowParams {
    /// Observations a series needs before it is eligible in `mode`.
    pub fn required_observations(&self, mode: ExtractionMode) -> usize {
        match mode {
            ExtractionMode::History => self.min_history_days + self.lookahead_days,
            ExtractionMode::Latest => self.min_history_days,
        }
    }

    /// First index that can carry a row: enough history plus defined volatility
    /// (needs `volatility_window` returns) and momentum.
    pub fn first_index(&self) -> usize {
        self.min_history_days
            .saturating_sub(1)
            .max(self.volatility_window)
            .max(self.momentum_window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.volatility_window < 2 {
            return Err(PipelineError::Config(
                "volatility_window must be >= 2".to_string(),
            ));
        }
        if self.momentum_window == 0 || self.beta_window < 2 || self.lookahead_days == 0 {
            return Err(PipelineError::Config(
                "momentum_window, beta_window and lookahead_days must be positive (beta_window >= 2)"
                    .to_string(),
            ));
        }
        let floor = self.volatility_window.max(self.momentum_window) + 1;
        if self.min_history_days < floor {
            return Err(PipelineError::Config(format!(
                "min_history_days {} is below the {} observations the feature windows need",
                self.min_history_days, floor
            )));
        }
        Ok(())
    }
}

use thiserror::Error;

use crate::model::recommendation::RiskLabel;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Per-instrument, recoverable: the series is too short for the requested mode.
    #[error("insufficient history for {ticker}: {observations} observations, need {required}")]
    InsufficientHistory {
        ticker: String,
        observations: usize,
        required: usize,
    },

    /// Per-instrument, recoverable: the series violates ordering or price invariants.
    #[error("invalid price series for {ticker}: {reason}")]
    InvalidSeries { ticker: String, reason: String },

    /// Per-row, recoverable: a window component could not be computed.
    #[error("feature alignment error for {ticker} at index {as_of_index}: {reason}")]
    FeatureAlignment {
        ticker: String,
        as_of_index: usize,
        reason: String,
    },

    /// Per-instrument, recoverable: the extraction task for one ticker died.
    #[error("feature extraction task for {ticker} failed: {reason}")]
    ExtractionTask { ticker: String, reason: String },

    #[error("feature preparation error: {0}")]
    FeaturePreparation(String),

    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    /// Informational only; the selector returns a short list instead of raising this.
    #[error("bucket {label} has {available} eligible instruments, requested {requested}")]
    BucketUnderflow {
        label: RiskLabel,
        available: usize,
        requested: usize,
    },

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// `true` for the conditions that abort a run or a prediction call.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InsufficientHistory { .. }
                | Self::InvalidSeries { .. }
                | Self::FeatureAlignment { .. }
                | Self::ExtractionTask { .. }
                | Self::BucketUnderflow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

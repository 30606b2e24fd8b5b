//! End-to-end runs: history features -> fitted preprocessing + forecaster, and
//! latest features -> bucketed top-N picks.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::features::{
    extract_universe, extract_universe_concurrent, ExtractionMode, SkippedInstrument,
    UniverseExtraction, WindowParams,
};
use crate::forecast::evaluate::evaluate_linear_holdout;
use crate::forecast::{Forecaster, HoldoutReport, LinearForecaster, Preprocessor, ReturnModel};
use crate::model::feature_row::{FeatureRow, FeatureTable, FeatureVector, FEATURE_COUNT};
use crate::model::price_series::PriceSeriesStore;
use crate::model::recommendation::{Recommendation, RiskLabel};
use crate::risk::BucketSource;
use crate::selection::{bucket_sizes, select_all_buckets, ScoredInstrument};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParams {
    pub windows: WindowParams,
    pub top_n: usize,
    /// One blocking task per instrument during extraction.
    pub concurrent: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            windows: WindowParams::default(),
            top_n: 5,
            concurrent: false,
        }
    }
}

/// Fitted artifacts for one run, constructed once and read-only afterwards.
pub struct PipelineContext {
    preprocessor: Preprocessor,
    forecaster: Box<dyn Forecaster>,
    buckets: BucketSource,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("preprocessor", &self.preprocessor)
            .field("forecaster", &self.forecaster.name())
            .field("buckets", &self.buckets)
            .finish()
    }
}

impl PipelineContext {
    pub fn new(
        preprocessor: Preprocessor,
        forecaster: Box<dyn Forecaster>,
        buckets: BucketSource,
    ) -> Result<Self> {
        forecaster.validate()?;
        if forecaster.n_features() != FEATURE_COUNT {
            return Err(PipelineError::Artifact(format!(
                "forecaster `{}` takes {} features, pipeline produces {}",
                forecaster.name(),
                forecaster.n_features(),
                FEATURE_COUNT
            )));
        }
        if preprocessor.imputer.medians().len() != FEATURE_COUNT {
            return Err(PipelineError::Artifact(format!(
                "imputer was fit on {} features, pipeline produces {}",
                preprocessor.imputer.medians().len(),
                FEATURE_COUNT
            )));
        }
        Ok(Self {
            preprocessor,
            forecaster,
            buckets,
        })
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn forecaster(&self) -> &dyn Forecaster {
        self.forecaster.as_ref()
    }

    pub fn buckets(&self) -> &BucketSource {
        &self.buckets
    }

    /// Impute, scale and predict one row.
    pub fn predict_row(&self, row: &FeatureRow) -> Result<f64> {
        let scaled = self.preprocessor.transform(&row.feature_vector())?;
        self.forecaster.predict(&scaled)
    }
}

/// Output of a training pass, before any bucket source is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub preprocessor: Preprocessor,
    pub forecaster: LinearForecaster,
}

impl TrainedModel {
    pub fn into_context(self, buckets: BucketSource) -> Result<PipelineContext> {
        PipelineContext::new(
            self.preprocessor,
            Box::new(ReturnModel::Linear(self.forecaster)),
            buckets,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub instruments: usize,
    pub skipped_instruments: usize,
    pub feature_rows: usize,
    pub training_rows: usize,
    pub holdout: HoldoutReport,
}

/// Fit the imputer, scaler and linear forecaster on history rows.
pub fn train(store: &PriceSeriesStore, params: &WindowParams) -> Result<(TrainedModel, TrainingReport)> {
    params.validate()?;
    let extraction = extract_universe(store, params, ExtractionMode::History)?;
    train_on(extraction)
}

pub async fn train_concurrent(
    store: Arc<PriceSeriesStore>,
    params: WindowParams,
) -> Result<(TrainedModel, TrainingReport)> {
    params.validate()?;
    let extraction = extract_universe_concurrent(store, params, ExtractionMode::History).await?;
    train_on(extraction)
}

/// Fit on an already extracted history table.
pub fn train_on(extraction: UniverseExtraction) -> Result<(TrainedModel, TrainingReport)> {
    let table = &extraction.table;
    let rows = table.training_rows();
    if rows.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "none of {} feature rows has both a forward return and a beta",
            table.len()
        )));
    }

    let vectors: Vec<FeatureVector> = rows.iter().map(|r| r.feature_vector()).collect();
    let preprocessor = Preprocessor::fit(&vectors)?;
    let x = vectors
        .iter()
        .map(|v| preprocessor.transform(v))
        .collect::<Result<Vec<_>>>()?;
    let y: Vec<f64> = rows.iter().filter_map(|r| r.forward_return).collect();

    let holdout = evaluate_linear_holdout(&x, &y)?;
    let forecaster = LinearForecaster::fit(&x, &y)?;

    let report = TrainingReport {
        instruments: table.tickers().len(),
        skipped_instruments: extraction.skipped.len(),
        feature_rows: table.len(),
        training_rows: rows.len(),
        holdout,
    };
    tracing::info!(
        training_rows = report.training_rows,
        train_mse = report.holdout.train_mse,
        test_mse = ?report.holdout.test_mse,
        cv_mse = ?report.holdout.cv_mse,
        "Forecaster trained"
    );
    Ok((
        TrainedModel {
            preprocessor,
            forecaster,
        },
        report,
    ))
}

#[derive(Debug)]
pub struct RunOutput {
    /// Buckets Low, Medium, High; 1-based ranks within each.
    pub recommendations: Vec<Recommendation>,
    /// Every labelled instrument with its prediction, in ticker order.
    pub scored: Vec<ScoredInstrument>,
    pub features: FeatureTable,
    pub skipped: Vec<SkippedInstrument>,
}

impl RunOutput {
    pub fn for_bucket(&self, label: RiskLabel) -> Vec<&Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.risk_label == label)
            .collect()
    }
}

/// Latest-snapshot features, bucket labels, predictions and top-N picks.
pub fn recommend(
    store: &PriceSeriesStore,
    ctx: &PipelineContext,
    params: &RunParams,
) -> Result<RunOutput> {
    params.windows.validate()?;
    let extraction = extract_universe(store, &params.windows, ExtractionMode::Latest)?;
    recommend_on(extraction, ctx, params.top_n)
}

pub async fn recommend_concurrent(
    store: Arc<PriceSeriesStore>,
    ctx: &PipelineContext,
    params: &RunParams,
) -> Result<RunOutput> {
    params.windows.validate()?;
    let extraction =
        extract_universe_concurrent(store, params.windows, ExtractionMode::Latest).await?;
    recommend_on(extraction, ctx, params.top_n)
}

/// Score an already extracted latest table.
pub fn recommend_on(
    extraction: UniverseExtraction,
    ctx: &PipelineContext,
    top_n: usize,
) -> Result<RunOutput> {
    let UniverseExtraction { table, skipped } = extraction;
    let latest = table.latest_rows();
    if latest.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "no latest feature rows to score".to_string(),
        ));
    }

    let labels: BTreeMap<String, RiskLabel> = ctx.buckets.resolve(&latest)?;
    let mut scored = Vec::with_capacity(latest.len());
    for row in &latest {
        let Some(label) = labels.get(&row.ticker) else {
            tracing::warn!(ticker = %row.ticker, "No risk bucket for instrument, skipping");
            continue;
        };
        let predicted_return = ctx.predict_row(row)?;
        scored.push(ScoredInstrument::new(row.ticker.clone(), *label, predicted_return));
    }
    if scored.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "no scored instrument has a risk bucket".to_string(),
        ));
    }

    let sizes = bucket_sizes(&scored);
    let size_of = |label: RiskLabel| sizes.get(&label).copied().unwrap_or(0);
    tracing::info!(
        low = size_of(RiskLabel::Low),
        medium = size_of(RiskLabel::Medium),
        high = size_of(RiskLabel::High),
        top_n,
        "Scored instruments per bucket"
    );
    let recommendations = select_all_buckets(&scored, top_n);
    tracing::info!(
        scored = scored.len(),
        recommendations = recommendations.len(),
        forecaster = ctx.forecaster.name(),
        "Recommendations ready"
    );
    Ok(RunOutput {
        recommendations,
        scored,
        features: table,
        skipped,
    })
}

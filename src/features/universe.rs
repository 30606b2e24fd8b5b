use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};

use super::extractor::{try_extract, BenchmarkReturns};
use super::{ExtractionMode, WindowParams};
use crate::error::{PipelineError, Result};
use crate::model::feature_row::{FeatureRow, FeatureTable};
use crate::model::price_series::PriceSeriesStore;

#[derive(Debug)]
pub struct SkippedInstrument {
    pub ticker: String,
    pub reason: PipelineError,
}

#[derive(Debug)]
pub struct UniverseExtraction {
    pub table: FeatureTable,
    /// Instruments that produced no rows, in ticker order.
    pub skipped: Vec<SkippedInstrument>,
}

/// Extract every instrument in the store on the calling thread.
///
/// Short or otherwise ineligible instruments are logged and skipped. Fails with
/// [`PipelineError::EmptyDataset`] only when no instrument yields a row.
pub fn extract_universe(
    store: &PriceSeriesStore,
    params: &WindowParams,
    mode: ExtractionMode,
) -> Result<UniverseExtraction> {
    let benchmark = BenchmarkReturns::from_series(store.benchmark());
    let outcomes = store
        .instruments()
        .map(|series| {
            (
                series.ticker().to_string(),
                try_extract(series, &benchmark, params, mode),
            )
        })
        .collect();
    collect_outcomes(outcomes, mode)
}

/// Same result as [`extract_universe`], with one blocking task per instrument.
pub async fn extract_universe_concurrent(
    store: Arc<PriceSeriesStore>,
    params: WindowParams,
    mode: ExtractionMode,
) -> Result<UniverseExtraction> {
    let benchmark = Arc::new(BenchmarkReturns::from_series(store.benchmark()));
    let tickers = store.tickers();
    let outcomes = run_blocking_per_ticker(tickers, move |ticker| match store.get(ticker) {
        Some(series) => try_extract(series, &benchmark, &params, mode),
        None => Ok(Vec::new()),
    })
    .await;
    collect_outcomes(outcomes, mode)
}

/// Run `extract` for every ticker on the blocking pool. A task that panics is
/// reported against its ticker instead of vanishing from the outcome list.
async fn run_blocking_per_ticker<F>(
    tickers: Vec<String>,
    extract: F,
) -> Vec<(String, Result<Vec<FeatureRow>>)>
where
    F: Fn(&str) -> Result<Vec<FeatureRow>> + Send + Sync + 'static,
{
    let extract = Arc::new(extract);
    let mut tasks = JoinSet::new();
    let mut names: HashMap<Id, String> = HashMap::with_capacity(tickers.len());
    for ticker in tickers {
        let extract = Arc::clone(&extract);
        let name = ticker.clone();
        let handle = tasks.spawn_blocking(move || {
            let outcome = extract(&ticker);
            (ticker, outcome)
        });
        names.insert(handle.id(), name);
    }

    let mut outcomes = Vec::with_capacity(names.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                let ticker = names.remove(&e.id()).unwrap_or_default();
                tracing::error!(ticker = %ticker, error = %e, "Feature extraction task failed");
                outcomes.push((
                    ticker.clone(),
                    Err(PipelineError::ExtractionTask {
                        ticker,
                        reason: e.to_string(),
                    }),
                ));
            }
        }
    }
    outcomes
}

fn collect_outcomes(
    mut outcomes: Vec<(String, Result<Vec<FeatureRow>>)>,
    mode: ExtractionMode,
) -> Result<UniverseExtraction> {
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rows = Vec::new();
    let mut skipped = Vec::new();
    for (ticker, outcome) in outcomes {
        match outcome {
            Ok(r) if !r.is_empty() => rows.extend(r),
            Ok(_) => {
                tracing::warn!(ticker = %ticker, "No feature rows produced, skipping");
                skipped.push(SkippedInstrument {
                    reason: PipelineError::EmptyDataset(format!("no rows for {}", ticker)),
                    ticker,
                });
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(ticker = %ticker, error = %e, "Skipping instrument");
                skipped.push(SkippedInstrument { ticker, reason: e });
            }
            Err(e) => return Err(e),
        }
    }

    if rows.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no feature rows survived extraction ({} instruments skipped, mode {:?})",
            skipped.len(),
            mode
        )));
    }

    let table = FeatureTable::from_rows(rows);
    tracing::info!(
        rows = table.len(),
        instruments = table.tickers().len(),
        skipped = skipped.len(),
        "Feature extraction complete"
    );
    Ok(UniverseExtraction { table, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_task_is_reported_as_skipped() {
        let tickers = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
        let outcomes = run_blocking_per_ticker(tickers, |ticker| {
            if ticker == "BBB" {
                panic!("extraction blew up");
            }
            Ok(Vec::new())
        })
        .await;
        assert_eq!(outcomes.len(), 3);

        let err = collect_outcomes(outcomes, ExtractionMode::Latest).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset(_)));
    }

    #[tokio::test]
    async fn panicked_task_keeps_its_ticker() {
        let tickers = vec!["AAA".to_string(), "BBB".to_string()];
        let mut outcomes = run_blocking_per_ticker(tickers, |ticker| {
            if ticker == "BBB" {
                panic!("extraction blew up");
            }
            Ok(Vec::new())
        })
        .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(outcomes[0].0, "AAA");
        assert_eq!(outcomes[1].0, "BBB");
        match &outcomes[1].1 {
            Err(PipelineError::ExtractionTask { ticker, .. }) => assert_eq!(ticker, "BBB"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!outcomes[1].1.as_ref().unwrap_err().is_fatal());
    }
}

use serde::Serialize;

use super::{Forecaster, LinearForecaster};
use crate::error::Result;

pub const HOLDOUT_EVERY: usize = 5;
pub const CV_FOLDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoldoutReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_mse: f64,
    /// `None` when the split leaves no test rows.
    pub test_mse: Option<f64>,
    /// Mean validation MSE over [`CV_FOLDS`] contiguous folds of the training
    /// split; `None` with fewer training rows than folds.
    pub cv_mse: Option<f64>,
}

/// Deterministic 80/20 split: every fifth row (in the given order) is held out.
pub fn holdout_split<T: Clone>(rows: &[T]) -> (Vec<T>, Vec<T>) {
    let mut train = Vec::with_capacity(rows.len());
    let mut test = Vec::with_capacity(rows.len() / HOLDOUT_EVERY + 1);
    for (i, r) in rows.iter().enumerate() {
        if i % HOLDOUT_EVERY == HOLDOUT_EVERY - 1 {
            test.push(r.clone());
        } else {
            train.push(r.clone());
        }
    }
    (train, test)
}

pub fn mse<F: Forecaster + ?Sized>(model: &F, x: &[Vec<f64>], y: &[f64]) -> Result<Option<f64>> {
    if x.is_empty() {
        return Ok(None);
    }
    let mut total = 0.0;
    for (row, target) in x.iter().zip(y) {
        let err = model.predict(row)? - target;
        total += err * err;
    }
    Ok(Some(total / x.len() as f64))
}

/// Contiguous folds in row order, like an unshuffled k-fold: the first
/// `len % k` folds take one extra row. Returns `(start, end)` ranges.
pub fn fold_bounds(len: usize, k: usize) -> Vec<(usize, usize)> {
    if k == 0 || len < k {
        return Vec::new();
    }
    let base = len / k;
    let extra = len % k;
    let mut start = 0;
    (0..k)
        .map(|fold| {
            let end = start + base + usize::from(fold < extra);
            let bounds = (start, end);
            start = end;
            bounds
        })
        .collect()
}

/// Mean out-of-fold MSE of a linear model refit on each fold's complement.
pub fn kfold_linear_mse(x: &[Vec<f64>], y: &[f64], k: usize) -> Result<Option<f64>> {
    let folds = fold_bounds(x.len(), k);
    if folds.is_empty() {
        return Ok(None);
    }
    let mut total = 0.0;
    for &(start, end) in &folds {
        let fit_x: Vec<Vec<f64>> = x[..start].iter().chain(&x[end..]).cloned().collect();
        let fit_y: Vec<f64> = y[..start].iter().chain(&y[end..]).copied().collect();
        let model = LinearForecaster::fit(&fit_x, &fit_y)?;
        total += mse(&model, &x[start..end], &y[start..end])?.unwrap_or(0.0);
    }
    Ok(Some(total / folds.len() as f64))
}

/// Fit a linear model on the training split and score both splits.
pub fn evaluate_linear_holdout(x: &[Vec<f64>], y: &[f64]) -> Result<HoldoutReport> {
    let pairs: Vec<(Vec<f64>, f64)> = x.iter().cloned().zip(y.iter().copied()).collect();
    let (train, test) = holdout_split(&pairs);
    let (train_x, train_y): (Vec<Vec<f64>>, Vec<f64>) = train.into_iter().unzip();
    let (test_x, test_y): (Vec<Vec<f64>>, Vec<f64>) = test.into_iter().unzip();

    let model = LinearForecaster::fit(&train_x, &train_y)?;
    Ok(HoldoutReport {
        train_rows: train_x.len(),
        test_rows: test_x.len(),
        train_mse: mse(&model, &train_x, &train_y)?.unwrap_or(0.0),
        test_mse: mse(&model, &test_x, &test_y)?,
        cv_mse: kfold_linear_mse(&train_x, &train_y, CV_FOLDS)?,
    })
}

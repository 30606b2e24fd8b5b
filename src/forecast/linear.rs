use serde::{Deserialize, Serialize};

use super::{check_width, Forecaster};
use crate::error::{PipelineError, Result};

const RIDGE: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearForecaster {
    #[serde(default = "default_name")]
    pub name: String,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

fn default_name() -> String {
    "linear-v1".to_string()
}

impl LinearForecaster {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            name: default_name(),
            coefficients,
            intercept,
        }
    }

    /// Least squares with an unpenalized intercept.
    ///
    /// A tiny ridge term on the slopes keeps collinear inputs solvable.
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(PipelineError::EmptyDataset(format!(
                "linear fit needs matching non-empty inputs ({} rows, {} targets)",
                x.len(),
                y.len()
            )));
        }
        let p = x[0].len();
        if x.iter().any(|r| r.len() != p) {
            return Err(PipelineError::FeaturePreparation(
                "ragged feature matrix".to_string(),
            ));
        }

        // Normal equations over [1, x_1 .. x_p].
        let k = p + 1;
        let mut a = vec![vec![0.0; k]; k];
        let mut b = vec![0.0; k];
        for (row, target) in x.iter().zip(y) {
            let design: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..k {
                b[i] += design[i] * target;
                for j in 0..k {
                    a[i][j] += design[i] * design[j];
                }
            }
        }
        for (i, row) in a.iter_mut().enumerate().skip(1) {
            row[i] += RIDGE * x.len() as f64;
        }

        let solution = solve(a, b)?;
        Ok(Self::new(solution[1..].to_vec(), solution[0]))
    }
}

impl Forecaster for LinearForecaster {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        check_width(self, features)?;
        Ok(self.intercept
            + features
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn validate(&self) -> Result<()> {
        if self.coefficients.is_empty()
            || !self.intercept.is_finite()
            || self.coefficients.iter().any(|w| !w.is_finite())
        {
            return Err(PipelineError::Artifact(format!(
                "linear model `{}` is empty or non-finite",
                self.name
            )));
        }
        Ok(())
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(PipelineError::FeaturePreparation(
                "singular design matrix".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        let pivot_row = a[col].clone();
        let pivot_b = b[col];
        for row in (col + 1)..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[row][c] -= factor * pivot_row[c];
            }
            b[row] -= factor * pivot_b;
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|c| a[row][c] * x[c]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_recovers_exact_linear_relation() {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let t = i as f64;
                vec![t, (t * 0.7).sin(), (t * 1.3).cos()]
            })
            .collect();
        let y: Vec<f64> = x
            .iter()
            .map(|r| 0.5 + 2.0 * r[0] - 1.0 * r[1] + 0.25 * r[2])
            .collect();
        let m = LinearForecaster::fit(&x, &y).unwrap();
        assert!((m.intercept - 0.5).abs() < 1e-4);
        assert!((m.coefficients[0] - 2.0).abs() < 1e-4);
        assert!((m.coefficients[1] + 1.0).abs() < 1e-4);
        assert!((m.coefficients[2] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let m = LinearForecaster::new(vec![1.0, 2.0, 3.0], 0.0);
        assert!(matches!(
            m.predict(&[1.0, 2.0]).unwrap_err(),
            PipelineError::FeaturePreparation(_)
        ));
        assert!((m.predict(&[1.0, 1.0, 1.0]).unwrap() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn fit_rejects_mismatched_targets() {
        assert!(LinearForecaster::fit(&[vec![1.0]], &[1.0, 2.0]).is_err());
    }
}

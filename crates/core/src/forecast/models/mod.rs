use crate::domain::forecast::ModelResult;
use std::sync::Arc;

mod ar;
mod holt;
mod windowed;

pub use ar::{Ar, ArParams, SeasonalAr};
pub use holt::Holt;
pub use windowed::{Windowed, WindowedParams};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("fit failed: {0}")]
    Fit(String),
}

/// One forecasting strategy. Implementations fit on a training prefix and
/// forecast `horizon` future steps; all failure modes are `ModelError`s,
/// never panics on finite input.
pub trait ModelRunner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fixed minimum history this strategy needs, independent of the
    /// 2x-horizon floor enforced by `backtest`.
    fn min_window(&self, horizon: u32) -> usize;

    fn fit_forecast(&self, train: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError>;
}

/// Registration order is the tie-break priority for best-model selection.
pub fn default_runners() -> Vec<Arc<dyn ModelRunner>> {
    vec![
        Arc::new(Ar::default()),
        Arc::new(SeasonalAr::default()),
        Arc::new(Holt::default()),
        Arc::new(Windowed::default()),
    ]
}

/// Runs one strategy against a series: validate the window, hold out the last
/// `horizon` points, fit on the prefix, score the forecast by RMSE.
///
/// This is the failure boundary of the model contract: every error comes back
/// as a Failed `ModelResult`, nothing propagates to the caller.
pub fn backtest(runner: &dyn ModelRunner, closes: &[f64], horizon: u32) -> ModelResult {
    if horizon == 0 {
        return ModelResult::failed("horizon must be positive");
    }
    let h = horizon as usize;

    let need = runner.min_window(horizon).max(2 * h);
    if closes.len() < need {
        return ModelResult::failed(format!(
            "insufficient data: {} needs at least {need} points for horizon {horizon}, got {}",
            runner.name(),
            closes.len()
        ));
    }

    let (train, holdout) = closes.split_at(closes.len() - h);
    match runner.fit_forecast(train, horizon) {
        Ok(path) => {
            if path.len() != h {
                return ModelResult::failed(format!(
                    "{} produced {} forecast steps, expected {h}",
                    runner.name(),
                    path.len()
                ));
            }
            match rmse(&path, holdout) {
                Some(err) if err.is_finite() => ModelResult::success(err, path),
                _ => ModelResult::failed(format!(
                    "{} produced a non-finite backtest error",
                    runner.name()
                )),
            }
        }
        Err(err) => ModelResult::failed(err.to_string()),
    }
}

pub(crate) fn rmse(predictions: &[f64], actuals: &[f64]) -> Option<f64> {
    if predictions.len() != actuals.len() || predictions.is_empty() {
        return None;
    }
    let mse = predictions
        .iter()
        .zip(actuals)
        .map(|(p, a)| (p - a) * (p - a))
        .sum::<f64>()
        / predictions.len() as f64;
    Some(mse.sqrt())
}

/// Solves `X^T X beta = X^T y` by Gaussian elimination with partial pivoting.
/// `ridge` is added to the diagonal for every coefficient except the first
/// (intercept) column.
pub(crate) fn solve_normal_equations(
    rows: &[Vec<f64>],
    targets: &[f64],
    ridge: f64,
) -> Result<Vec<f64>, ModelError> {
    let n = rows.len();
    if n == 0 || n != targets.len() {
        return Err(ModelError::Fit(
            "empty or mismatched regression inputs".to_string(),
        ));
    }
    let k = rows[0].len();
    if k == 0 || rows.iter().any(|r| r.len() != k) {
        return Err(ModelError::Fit("ragged regression rows".to_string()));
    }

    let mut ata = vec![vec![0.0_f64; k]; k];
    let mut atb = vec![0.0_f64; k];
    for (row, y) in rows.iter().zip(targets) {
        for i in 0..k {
            for j in 0..k {
                ata[i][j] += row[i] * row[j];
            }
            atb[i] += row[i] * y;
        }
    }
    for (i, diag) in ata.iter_mut().enumerate().skip(1) {
        diag[i] += ridge;
    }

    // Forward elimination.
    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|a, b| {
                ata[*a][col]
                    .abs()
                    .partial_cmp(&ata[*b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if ata[pivot_row][col].abs() < 1e-12 {
            return Err(ModelError::Fit(
                "singular least-squares system".to_string(),
            ));
        }
        ata.swap(col, pivot_row);
        atb.swap(col, pivot_row);

        for row in (col + 1)..k {
            let factor = ata[row][col] / ata[col][col];
            for j in col..k {
                ata[row][j] -= factor * ata[col][j];
            }
            atb[row] -= factor * atb[col];
        }
    }

    // Back substitution.
    let mut beta = vec![0.0_f64; k];
    for col in (0..k).rev() {
        let mut acc = atb[col];
        for j in (col + 1)..k {
            acc -= ata[col][j] * beta[j];
        }
        beta[col] = acc / ata[col][col];
    }

    if beta.iter().any(|b| !b.is_finite()) {
        return Err(ModelError::Fit(
            "non-finite least-squares solution".to_string(),
        ));
    }
    Ok(beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rmse_of_exact_prediction_is_zero() {
        let err = rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(err.abs() < 1e-12);
    }

    #[test]
    fn rmse_rejects_mismatched_lengths() {
        assert!(rmse(&[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn least_squares_recovers_a_line() {
        // y = 2 + 3x
        let rows: Vec<Vec<f64>> = (0..10).map(|x| vec![1.0, x as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|x| 2.0 + 3.0 * x as f64).collect();
        let beta = solve_normal_equations(&rows, &targets, 0.0).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-9);
        assert!((beta[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn short_series_fails_with_deterministic_reason() {
        let runner = Holt::default();
        let closes = vec![10.0; 8];
        let result = backtest(&runner, &closes, 5);
        assert!(!result.is_success());
        assert_eq!(
            result.failure_reason.as_deref(),
            Some("insufficient data: holt needs at least 30 points for horizon 5, got 8")
        );
    }

    #[test]
    fn zero_horizon_is_rejected_at_the_boundary() {
        let runner = Ar::default();
        let result = backtest(&runner, &[1.0; 100], 0);
        assert!(!result.is_success());
    }

    #[test]
    fn backtest_success_carries_full_path() {
        // Linear ramp; Holt tracks it exactly.
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = backtest(&Holt::default(), &closes, 5);
        assert!(result.is_success());
        let path = result.forecast_path.as_ref().unwrap();
        assert_eq!(path.len(), 5);
        assert!(result.backtest_error.unwrap() < 1e-6);
        assert_eq!(result.point_forecast, path.last().copied());
    }
}

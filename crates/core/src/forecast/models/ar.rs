use super::{solve_normal_equations, ModelError, ModelRunner};
use serde::{Deserialize, Serialize};

const AR_RIDGE: f64 = 1e-6;

/// Fitted difference-autoregression parameters; `coefficients[i]` multiplies
/// the diff at lag `i + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArParams {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl ArParams {
    pub fn forecast(&self, recent: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        let p = self.coefficients.len();
        if recent.len() < p + 1 {
            return Err(ModelError::InsufficientData(format!(
                "need {} recent points to apply an order-{p} autoregression, got {}",
                p + 1,
                recent.len()
            )));
        }
        let mut diffs = diff(recent);
        let mut last = *recent.last().ok_or_else(|| {
            ModelError::InsufficientData("empty recent series".to_string())
        })?;

        let mut out = Vec::with_capacity(horizon as usize);
        for _ in 0..horizon {
            let mut next_diff = self.intercept;
            for (i, coef) in self.coefficients.iter().enumerate() {
                next_diff += coef * diffs[diffs.len() - 1 - i];
            }
            diffs.push(next_diff);
            last += next_diff;
            out.push(last);
        }
        Ok(out)
    }
}

/// Autoregression on first differences (the classic ARIMA(p,1,0) shape).
/// The order degrades gracefully when the training prefix is short.
#[derive(Debug, Clone)]
pub struct Ar {
    pub max_order: usize,
}

impl Default for Ar {
    fn default() -> Self {
        Self { max_order: 5 }
    }
}

impl Ar {
    pub fn fit(&self, train: &[f64]) -> Result<ArParams, ModelError> {
        let diffs = diff(train);
        // Largest order that still leaves more equations than unknowns.
        let order = self.max_order.min(diffs.len().saturating_sub(2) / 2);
        if order == 0 {
            return Err(ModelError::InsufficientData(
                "not enough history to fit an autoregression".to_string(),
            ));
        }
        fit_diff_regression(&diffs, order, None)
    }
}

impl ModelRunner for Ar {
    fn name(&self) -> &'static str {
        "ar"
    }

    fn min_window(&self, horizon: u32) -> usize {
        2 * horizon as usize
    }

    fn fit_forecast(&self, train: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        self.fit(train)?.forecast(train, horizon)
    }
}

/// Difference autoregression with an extra seasonal lag term.
#[derive(Debug, Clone)]
pub struct SeasonalAr {
    pub order: usize,
    pub seasonal_lag: usize,
}

impl Default for SeasonalAr {
    fn default() -> Self {
        Self {
            order: 2,
            seasonal_lag: 12,
        }
    }
}

impl ModelRunner for SeasonalAr {
    fn name(&self) -> &'static str {
        "seasonal_ar"
    }

    fn min_window(&self, horizon: u32) -> usize {
        2 * horizon as usize
    }

    fn fit_forecast(&self, train: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        let diffs = diff(train);
        let first_row = self.order.max(self.seasonal_lag);
        // Unknowns: intercept + order lags + one seasonal lag.
        if diffs.len() < first_row + self.order + 3 {
            return Err(ModelError::InsufficientData(format!(
                "not enough history for seasonal lag {}",
                self.seasonal_lag
            )));
        }
        let params = fit_diff_regression(&diffs, self.order, Some(self.seasonal_lag))?;

        // Recursive forecast over the growing diff history.
        let mut all_diffs = diffs;
        let mut last = *train.last().ok_or_else(|| {
            ModelError::InsufficientData("empty training series".to_string())
        })?;
        let mut out = Vec::with_capacity(horizon as usize);
        for _ in 0..horizon {
            let t = all_diffs.len();
            let mut next_diff = params.intercept;
            for i in 0..self.order {
                next_diff += params.coefficients[i] * all_diffs[t - 1 - i];
            }
            next_diff += params.coefficients[self.order] * all_diffs[t - self.seasonal_lag];
            all_diffs.push(next_diff);
            last += next_diff;
            out.push(last);
        }
        Ok(out)
    }
}

fn diff(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Least-squares fit of `d[t] ~ intercept + d[t-1..t-order] (+ d[t-seasonal])`.
/// The seasonal coefficient, when requested, is appended after the lag terms.
fn fit_diff_regression(
    diffs: &[f64],
    order: usize,
    seasonal_lag: Option<usize>,
) -> Result<ArParams, ModelError> {
    let first_row = seasonal_lag.map_or(order, |s| order.max(s));
    if diffs.len() <= first_row {
        return Err(ModelError::InsufficientData(
            "not enough differenced observations".to_string(),
        ));
    }

    let mut rows = Vec::with_capacity(diffs.len() - first_row);
    let mut targets = Vec::with_capacity(diffs.len() - first_row);
    for t in first_row..diffs.len() {
        let mut row = Vec::with_capacity(order + 2);
        row.push(1.0);
        for i in 1..=order {
            row.push(diffs[t - i]);
        }
        if let Some(s) = seasonal_lag {
            row.push(diffs[t - s]);
        }
        rows.push(row);
        targets.push(diffs[t]);
    }

    let beta = solve_normal_equations(&rows, &targets, AR_RIDGE)?;
    Ok(ArParams {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::models::backtest;

    #[test]
    fn tracks_a_constant_drift() {
        // Constant +2 steps: every diff is 2, so the forecast keeps climbing by ~2.
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + 2.0 * i as f64).collect();
        let ar = Ar::default();
        let path = ar.fit_forecast(&closes, 3).unwrap();
        assert_eq!(path.len(), 3);
        for (i, value) in path.iter().enumerate() {
            let expected = closes.last().unwrap() + 2.0 * (i + 1) as f64;
            assert!(
                (value - expected).abs() < 0.1,
                "step {i}: got {value}, expected ~{expected}"
            );
        }
    }

    #[test]
    fn order_degrades_on_short_training_prefixes() {
        // 6 points -> 5 diffs -> order 1 still fits.
        let closes = vec![10.0, 11.0, 12.5, 13.0, 14.2, 15.0];
        let ar = Ar::default();
        let path = ar.fit_forecast(&closes, 2).unwrap();
        assert_eq!(path.len(), 2);
        assert!(path.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn seasonal_ar_needs_the_seasonal_lag() {
        let closes = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        let err = SeasonalAr::default().fit_forecast(&closes, 2).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData(_)));
    }

    #[test]
    fn seasonal_ar_fits_given_enough_history() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + i as f64 + 3.0 * ((i % 12) as f64 / 12.0))
            .collect();
        let result = backtest(&SeasonalAr::default(), &closes, 5);
        assert!(result.is_success(), "{:?}", result.failure_reason);
    }

    #[test]
    fn fitted_params_round_trip_through_serde() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + 2.0 * i as f64).collect();
        let params = Ar::default().fit(&closes).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let restored: ArParams = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.coefficients.len(), params.coefficients.len());
    }
}

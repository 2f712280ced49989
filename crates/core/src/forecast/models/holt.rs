use super::{ModelError, ModelRunner};
use serde::{Deserialize, Serialize};

const MIN_WINDOW: usize = 30;

/// Holt's linear-trend double exponential smoothing with fixed smoothing
/// factors. The fitted "state" is just the factors; level and trend are
/// re-smoothed from whatever series the forecast is applied to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holt {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for Holt {
    fn default() -> Self {
        Self {
            alpha: 0.8,
            beta: 0.2,
        }
    }
}

impl Holt {
    pub fn forecast(&self, recent: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        if recent.len() < 2 {
            return Err(ModelError::InsufficientData(
                "need at least 2 points to smooth a trend".to_string(),
            ));
        }

        let mut level = recent[0];
        let mut trend = recent[1] - recent[0];
        for value in &recent[1..] {
            let next_level = self.alpha * value + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (next_level - level) + (1.0 - self.beta) * trend;
            level = next_level;
        }

        Ok((1..=horizon)
            .map(|step| level + trend * step as f64)
            .collect())
    }
}

impl ModelRunner for Holt {
    fn name(&self) -> &'static str {
        "holt"
    }

    fn min_window(&self, _horizon: u32) -> usize {
        MIN_WINDOW
    }

    fn fit_forecast(&self, train: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        self.forecast(train, horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continues_an_exact_linear_trend() {
        let closes: Vec<f64> = (0..40).map(|i| 10.0 + 1.5 * i as f64).collect();
        let path = Holt::default().fit_forecast(&closes, 4).unwrap();
        for (i, value) in path.iter().enumerate() {
            let expected = 10.0 + 1.5 * (40 + i) as f64;
            assert!(
                (value - expected).abs() < 1e-9,
                "step {i}: got {value}, expected {expected}"
            );
        }
    }

    #[test]
    fn flat_series_forecasts_flat() {
        let closes = vec![42.0; 35];
        let path = Holt::default().fit_forecast(&closes, 3).unwrap();
        for value in path {
            assert!((value - 42.0).abs() < 1e-9);
        }
    }

    #[test]
    fn one_point_is_not_enough() {
        let err = Holt::default().fit_forecast(&[1.0], 3).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData(_)));
    }
}

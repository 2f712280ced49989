use super::{solve_normal_equations, ModelError, ModelRunner};
use serde::{Deserialize, Serialize};

const LOOK_BACK: usize = 60;
const RIDGE: f64 = 1e-2;
const MIN_TRAIN_ROWS: usize = 8;

/// Fitted one-step window model: a linear map from the last `look_back`
/// min-max-scaled closes to the next scaled close, applied recursively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowedParams {
    pub look_back: usize,
    pub intercept: f64,
    pub weights: Vec<f64>,
    pub train_min: f64,
    pub train_max: f64,
}

impl WindowedParams {
    pub fn forecast(&self, recent: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        if self.weights.len() != self.look_back {
            return Err(ModelError::Fit(format!(
                "weight vector length {} does not match look_back {}",
                self.weights.len(),
                self.look_back
            )));
        }
        if recent.len() < self.look_back {
            return Err(ModelError::InsufficientData(format!(
                "need {} recent points, got {}",
                self.look_back,
                recent.len()
            )));
        }
        let span = self.train_max - self.train_min;
        if span <= 0.0 {
            return Err(ModelError::Fit("degenerate scaling range".to_string()));
        }

        let mut window: Vec<f64> = recent[recent.len() - self.look_back..]
            .iter()
            .map(|x| (x - self.train_min) / span)
            .collect();

        let mut out = Vec::with_capacity(horizon as usize);
        for _ in 0..horizon {
            let mut next = self.intercept;
            for (w, x) in self.weights.iter().zip(&window) {
                next += w * x;
            }
            window.remove(0);
            window.push(next);
            out.push(next * span + self.train_min);
        }
        Ok(out)
    }
}

/// Sliding-window one-step regressor, the crate's stand-in for a learned
/// sequence model: min-max scale the training prefix, regress each scaled
/// close on its preceding 60-point window, forecast recursively.
#[derive(Debug, Clone)]
pub struct Windowed {
    pub look_back: usize,
}

impl Default for Windowed {
    fn default() -> Self {
        Self {
            look_back: LOOK_BACK,
        }
    }
}

impl Windowed {
    pub fn fit(&self, train: &[f64]) -> Result<WindowedParams, ModelError> {
        if train.len() < self.look_back + MIN_TRAIN_ROWS {
            return Err(ModelError::InsufficientData(format!(
                "need at least {} points to fit {} training windows",
                self.look_back + MIN_TRAIN_ROWS,
                MIN_TRAIN_ROWS
            )));
        }

        let train_min = train.iter().cloned().fold(f64::INFINITY, f64::min);
        let train_max = train.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let span = train_max - train_min;
        if !(span > 0.0) {
            return Err(ModelError::Fit(
                "constant training series cannot be scaled".to_string(),
            ));
        }
        let scaled: Vec<f64> = train.iter().map(|x| (x - train_min) / span).collect();

        let mut rows = Vec::with_capacity(scaled.len() - self.look_back);
        let mut targets = Vec::with_capacity(scaled.len() - self.look_back);
        for i in self.look_back..scaled.len() {
            let mut row = Vec::with_capacity(self.look_back + 1);
            row.push(1.0);
            row.extend_from_slice(&scaled[i - self.look_back..i]);
            rows.push(row);
            targets.push(scaled[i]);
        }

        let beta = solve_normal_equations(&rows, &targets, RIDGE)?;
        Ok(WindowedParams {
            look_back: self.look_back,
            intercept: beta[0],
            weights: beta[1..].to_vec(),
            train_min,
            train_max,
        })
    }
}

impl ModelRunner for Windowed {
    fn name(&self) -> &'static str {
        "windowed"
    }

    fn min_window(&self, _horizon: u32) -> usize {
        LOOK_BACK
    }

    fn fit_forecast(&self, train: &[f64], horizon: u32) -> Result<Vec<f64>, ModelError> {
        self.fit(train)?.forecast(train, horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_and_forecasts_finitely_on_noisy_data() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64) * 0.3 + ((i * 7) % 13) as f64 * 0.5)
            .collect();
        let path = Windowed::default().fit_forecast(&closes, 5).unwrap();
        assert_eq!(path.len(), 5);
        assert!(path.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn constant_series_cannot_be_scaled() {
        let closes = vec![10.0; 120];
        let err = Windowed::default().fit_forecast(&closes, 5).unwrap_err();
        assert!(matches!(err, ModelError::Fit(_)));
    }

    #[test]
    fn too_few_training_windows_is_insufficient_data() {
        let closes: Vec<f64> = (0..62).map(|i| i as f64).collect();
        let err = Windowed::default().fit_forecast(&closes, 2).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData(_)));
    }

    #[test]
    fn params_round_trip_through_serde() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + (i as f64).sin() + i as f64 * 0.2).collect();
        let params = Windowed::default().fit(&closes).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let restored: WindowedParams = serde_json::from_str(&json).unwrap();
        let a = params.forecast(&closes, 3).unwrap();
        let b = restored.forecast(&closes, 3).unwrap();
        assert_eq!(a, b);
    }
}

/// Exponential moving average over a scalar stream.
///
/// Holds exactly one previous value. `rho` weights the history, so values
/// close to 1 smooth harder.
#[derive(Debug, Clone)]
pub struct EmaFilter {
    rho: f64,
    value: Option<f64>,
}

impl EmaFilter {
    pub fn new(rho: f64) -> Self {
        debug_assert!(rho > 0.0 && rho < 1.0, "rho must lie in (0, 1)");
        Self { rho, value: None }
    }

    /// Feeds one sample and returns the smoothed value.
    /// The first sample passes through unchanged.
    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.rho * prev + (1.0 - self.rho) * sample,
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }
}

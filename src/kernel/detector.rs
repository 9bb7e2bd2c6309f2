use serde::Serialize;

/// Per-tick classification of the smoothed EMG level against the calibrated
/// smiling reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmileDetector {
    smiling_average: f64,
    threshold_ratio: f64,
}

impl SmileDetector {
    pub fn new(smiling_average: f64, threshold_ratio: f64) -> Self {
        Self {
            smiling_average,
            threshold_ratio,
        }
    }

    /// Level above which the subject counts as smiling.
    pub fn threshold(&self) -> f64 {
        self.smiling_average * self.threshold_ratio
    }

    /// Strictly above the threshold; sitting exactly on it is not a smile.
    pub fn is_smiling(&self, current_emg: f64) -> bool {
        current_emg > self.threshold()
    }

    /// Fill level of the live EMG gauge, 0 at rest and 1 at (or past) the
    /// calibrated smiling average.
    pub fn gauge(&self, current_emg: f64) -> f64 {
        if self.smiling_average <= 0.0 {
            return 0.0;
        }
        (current_emg / self.smiling_average).clamp(0.0, 1.0)
    }

    /// Where the threshold bar sits on the gauge.
    pub fn threshold_mark(&self) -> f64 {
        self.threshold_ratio.clamp(0.0, 1.0)
    }

    pub fn smiling_average(&self) -> f64 {
        self.smiling_average
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SmileEdge {
    Started,
    Stopped,
}

/// Turns the per-tick boolean into start/stop transitions.
#[derive(Debug, Clone, Default)]
pub struct EdgeDetector {
    smiling: bool,
}

impl EdgeDetector {
    pub fn update(&mut self, smiling: bool) -> Option<SmileEdge> {
        if smiling == self.smiling {
            return None;
        }
        self.smiling = smiling;
        Some(if smiling {
            SmileEdge::Started
        } else {
            SmileEdge::Stopped
        })
    }

    pub fn is_smiling(&self) -> bool {
        self.smiling
    }
}

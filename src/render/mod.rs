//! The surface handed to the presentation collaborator. Pixels are not drawn
//! here; a [`RenderSink`] receives countdown cues and packaged frames.

pub mod console;

use serde::Serialize;

use crate::kernel::honeycomb::CellView;

pub use console::LogRenderer;

/// Presentation steps of the calibration countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CountdownCue {
    Prompt { title: String, description: String },
    Count(u32),
    Go,
    Clear,
}

/// Everything needed to draw one frame of the steady-state view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderFrame {
    /// Latest display-filtered EMG in mV, if any sample exists yet.
    pub emg: Option<f64>,
    /// Gauge fill in `[0, 1]`.
    pub gauge: f64,
    /// Position of the threshold bar on the gauge.
    pub threshold_mark: f64,
    pub smiling: bool,
    pub active_count: usize,
    pub capacity: usize,
    pub cells: Vec<CellView>,
}

pub trait RenderSink: Send {
    fn cue(&mut self, cue: &CountdownCue);
    fn frame(&mut self, frame: &RenderFrame);
}

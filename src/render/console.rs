use tracing::{debug, info};

use super::{CountdownCue, RenderFrame, RenderSink};

const GAUGE_WIDTH: usize = 30;

/// Text stand-in for a real display: logs cues, and a gauge bar whenever the
/// field or smile state changes.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<(usize, bool)>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn gauge_bar(gauge: f64, threshold_mark: f64) -> String {
    let filled = (gauge.clamp(0.0, 1.0) * GAUGE_WIDTH as f64).round() as usize;
    let bar = ((threshold_mark.clamp(0.0, 1.0) * GAUGE_WIDTH as f64) as usize).min(GAUGE_WIDTH - 1);
    (0..GAUGE_WIDTH)
        .map(|i| match (i == bar, i < filled) {
            (true, _) => '|',
            (false, true) => '#',
            (false, false) => '.',
        })
        .collect()
}

impl RenderSink for LogRenderer {
    fn cue(&mut self, cue: &CountdownCue) {
        match cue {
            CountdownCue::Prompt { title, description } => info!("{}: {}", title, description),
            CountdownCue::Count(n) => info!("{}", n),
            CountdownCue::Go => info!("Go!"),
            CountdownCue::Clear => debug!("Countdown cleared"),
        }
    }

    fn frame(&mut self, frame: &RenderFrame) {
        let state = (frame.active_count, frame.smiling);
        if self.last == Some(state) {
            return;
        }
        self.last = Some(state);
        info!(
            "[{}] {:>3}/{} cells{}",
            gauge_bar(frame.gauge, frame.threshold_mark),
            frame.active_count,
            frame.capacity,
            if frame.smiling { "  :)" } else { "" }
        );
    }
}

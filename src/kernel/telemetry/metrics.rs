use serde::Serialize;
use std::collections::VecDeque;

use super::event::{SessionEvent, Tick};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub smiles: u64,
    pub cell_activations: u64,
    pub cell_deactivations: u64,
    /// Largest active count reached.
    pub peak_active: usize,
    pub completed_at: Option<Tick>,
    /// Ticks spent smiling, counting an unfinished smile up to the last event.
    pub smiling_ticks: u64,
}

/// Pure reduction of the event log.
pub fn compute_summary(events: &VecDeque<SessionEvent>) -> SessionSummary {
    let mut summary = SessionSummary::default();
    let mut smile_started: Option<Tick> = None;

    for event in events {
        match event {
            SessionEvent::SmileStarted { tick, .. } => {
                summary.smiles += 1;
                smile_started = Some(*tick);
            }
            SessionEvent::SmileStopped { tick, .. } => {
                if let Some(start) = smile_started.take() {
                    summary.smiling_ticks += tick.since(start);
                }
            }
            SessionEvent::CellActivated { index, .. } => {
                summary.cell_activations += 1;
                // Cells activate in index order, so the index is the new count.
                summary.peak_active = summary.peak_active.max(*index);
            }
            SessionEvent::CellDeactivated { .. } => summary.cell_deactivations += 1,
            SessionEvent::FieldComplete { tick } => summary.completed_at = Some(*tick),
        }
    }

    if let (Some(start), Some(last)) = (smile_started, events.back()) {
        summary.smiling_ticks += last.tick().since(start);
    }

    summary
}

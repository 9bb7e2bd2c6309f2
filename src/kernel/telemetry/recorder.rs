use std::collections::VecDeque;

use super::event::SessionEvent;
use super::metrics::{compute_summary, SessionSummary};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug, Default)]
pub struct SessionTelemetry {
    buffer: VecDeque<SessionEvent>,
}

impl SessionTelemetry {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(256),
        }
    }

    pub fn record(&mut self, event: SessionEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &SessionEvent> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn summary(&self) -> SessionSummary {
        compute_summary(&self.buffer)
    }
}

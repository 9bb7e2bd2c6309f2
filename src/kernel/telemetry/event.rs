use serde::Serialize;

/// Field-update tick number, counted from the start of the interactive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Tick {
    pub frame: u64,
}

impl Tick {
    pub fn new() -> Self {
        Tick { frame: 0 }
    }

    pub fn next(&self) -> Self {
        Tick { frame: self.frame + 1 }
    }

    /// Ticks elapsed since `earlier`; zero if `earlier` is actually later.
    pub fn since(&self, earlier: Tick) -> u64 {
        self.frame.saturating_sub(earlier.frame)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    SmileStarted { tick: Tick, emg: f64 },
    SmileStopped { tick: Tick, emg: f64 },
    CellActivated { tick: Tick, index: usize },
    CellDeactivated { tick: Tick, index: usize },
    FieldComplete { tick: Tick },
}

impl SessionEvent {
    pub fn tick(&self) -> Tick {
        match self {
            SessionEvent::SmileStarted { tick, .. }
            | SessionEvent::SmileStopped { tick, .. }
            | SessionEvent::CellActivated { tick, .. }
            | SessionEvent::CellDeactivated { tick, .. }
            | SessionEvent::FieldComplete { tick } => *tick,
        }
    }
}

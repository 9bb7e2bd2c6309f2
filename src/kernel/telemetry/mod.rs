//! Session telemetry: a bounded log of what the feedback loop did, read only
//! after the session for the report. Nothing in the decision path reads it.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{SessionEvent, Tick};
pub use metrics::SessionSummary;
pub use recorder::SessionTelemetry;

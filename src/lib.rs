pub mod config;
pub mod device;
pub mod error;
pub mod kernel;
pub mod render;
pub mod signal;

pub use config::PipelineConfig;
pub use kernel::coordinator::{Coordinator, SessionReport, Termination};

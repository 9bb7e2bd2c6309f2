//! Signal conditioning: raw ADC codes to millivolts, exponential smoothing,
//! and the bounded sample histories shared between loops.

pub mod conditioner;
pub mod ema;
pub mod history;

pub use conditioner::{voltage, Conditioner};
pub use ema::EmaFilter;
pub use history::{BoundedHistory, LatestCell, SharedHistory};

pub mod calibration;
pub mod cancel;
pub mod coordinator;
pub mod detector;
pub mod honeycomb;
pub mod layout;
pub mod sampler;
pub mod telemetry;

//! Telemetry for the waveform ingestion pipeline.
//!
//! Counters are plain atomics shared by `Arc`; they are read by the health
//! surface and logged periodically. There is no external metrics sink.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;

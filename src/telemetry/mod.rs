//! Logging and frame timing

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig};
pub use metrics::{FrameProfiler, FrameStats};

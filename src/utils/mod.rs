//! # Utility Modules
//!
//! Supporting utilities shared by the connection engine.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: process-wide atomic counters for connections, frames and errors
//! - **Timeout**: default durations and an async timeout wrapper

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{global_metrics, MetricsSnapshot};

//! # Utility Modules
//!
//! Supporting utilities for logging, timing and observability.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Async timeout wrappers and default deadlines
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;
pub mod timeout;

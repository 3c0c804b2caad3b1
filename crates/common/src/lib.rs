//! Shared configuration, error types, and observability primitives for udflare crates.
//!
//! Architecture role:
//! - defines server configuration passed across layers
//! - provides common [`UdflareError`] / [`Result`] contracts
//! - hosts per-function evaluation metrics
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`metrics`]

pub mod config;
pub mod error;
pub mod metrics;

pub use config::ServerConfig;
pub use error::{Result, UdflareError};
pub use metrics::{global_metrics, MetricsRegistry};

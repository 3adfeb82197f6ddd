//! API layer
//!
//! HTTP handlers for:
//! - Routes behind session authentication
//! - Metrics (Prometheus)

mod me;
pub mod metrics;

pub use me::protected_router;
pub use metrics::metrics_router;

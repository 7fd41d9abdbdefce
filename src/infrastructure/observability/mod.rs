//! Pull-free observability for Storecast
//!
//! Metrics are collected in-process and rendered in Prometheus text format on
//! request (the `predict --metrics` flag). Nothing listens on a socket.

pub mod metrics;

pub use metrics::Metrics;

//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus process-level concerns.

/// Configuration from the environment.
pub mod config;

/// CSV snapshot exporter.
pub mod export;

/// HTTP query surface.
pub mod http;

/// In-memory collaborators for tests and local runs.
pub mod memory;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Wikipedia constituents ticker source.
pub mod wikipedia;

/// Yahoo chart market data provider.
pub mod yahoo;

//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the parallel executor, the refresh controller that
//! owns the published snapshot, and the port interfaces that define how
//! the pipeline reaches external systems.

/// Bounded parallel executor for per-instrument work.
pub mod executor;

/// Port interfaces for external systems (ticker source, market data, export).
pub mod ports;

/// Refresh orchestration and the result cache.
pub mod refresh;

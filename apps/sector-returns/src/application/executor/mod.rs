//! Bounded parallel executor for per-item async work.
//!
//! Maps a list of input items to results using a fixed number of tokio
//! workers pulling from a shared job queue. The executor knows nothing
//! about what the work is; the refresh pipeline supplies the closure.
//!
//! # Guarantees
//!
//! - Every item is dispatched to at most one worker.
//! - Results are correlated by input index, so duplicate items stay distinct.
//! - On cancellation or deadline expiry, workers stop pulling, in-flight work
//!   is abandoned, and everything already completed is still returned.
//!
//! # Example
//!
//! ```ignore
//! use sector_returns::application::executor::{ExecutorConfig, ParallelExecutor};
//!
//! let executor = ParallelExecutor::new(ExecutorConfig::default());
//! let report = executor
//!     .run(symbols, |symbol| async move { fetch(symbol).await }, &cancel)
//!     .await;
//!
//! for failure in &report.failures {
//!     println!("{} failed: {}", failure.item, failure.error);
//! }
//! ```

mod config;
mod error;
mod report;
mod runner;

pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use report::{ExecutionReport, ItemFailure};
pub use runner::ParallelExecutor;

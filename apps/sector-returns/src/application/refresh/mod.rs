//! Refresh Orchestration
//!
//! The [`RefreshController`] owns the published [`ResultSet`] and is the only
//! writer of it. A refresh runs the whole pipeline off to the side:
//!
//! ```text
//! TickerSource ──► ParallelExecutor ──► (per item) MarketData ──► compute
//!                                                                   │
//!   snapshot() ◄── atomic swap ◄── aggregate ◄──────────────────────┘
//! ```
//!
//! Readers clone an `Arc` under a read lock, so they see either the previous
//! snapshot or the new one, never a partial set. A failed refresh leaves the
//! installed snapshot untouched.
//!
//! [`ResultSet`]: crate::domain::ranking::ResultSet

mod budget;
mod controller;
mod error;
mod policy;

pub use budget::ErrorBudget;
pub use controller::{
    CacheState, ItemError, RefreshController, RefreshSettings, RefreshSummary,
};
pub use error::RefreshError;
pub use policy::ConcurrencyPolicy;

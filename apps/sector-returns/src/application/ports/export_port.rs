//! Snapshot Export Port (Driven Port)
//!
//! Interface for persisting a finished result set. Export failures are
//! reported to the caller but never block installing the snapshot.

use async_trait::async_trait;

use crate::domain::ranking::ResultSet;

/// Export error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExportError {
    /// Filesystem error.
    #[error("Export I/O error: {message}")]
    Io {
        /// Error details.
        message: String,
    },

    /// Encoding error.
    #[error("Export encoding error: {message}")]
    Encoding {
        /// Error details.
        message: String,
    },
}

/// Port for persisting result sets.
#[async_trait]
pub trait SnapshotExportPort: Send + Sync {
    /// Persist `result`.
    async fn export(&self, result: &ResultSet) -> Result<(), ExportError>;
}

/// No-op exporter for testing and for runs with export disabled.
#[derive(Debug, Clone, Default)]
pub struct NoOpExporter;

#[async_trait]
impl SnapshotExportPort for NoOpExporter {
    async fn export(&self, _result: &ResultSet) -> Result<(), ExportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::ranking::aggregate;
    use crate::domain::window::DateWindow;

    #[tokio::test]
    async fn no_op_exporter_succeeds() {
        let window = DateWindow::starting_at(2024, 2, 1).unwrap();
        let set = aggregate(Vec::new(), window, Utc::now());
        assert!(NoOpExporter.export(&set).await.is_ok());
    }
}

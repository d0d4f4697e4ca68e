//! CSV Snapshot Exporter
//!
//! Writes a result set as a two-block CSV artifact: ranked instruments, a
//! blank line, then ranked sectors. The document is rendered in memory,
//! written to a sibling temp file, and renamed over the target, so readers
//! and concurrent exports only ever see a complete file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::ports::{ExportError, SnapshotExportPort};
use crate::domain::ranking::ResultSet;

const ITEM_HEADER: [&str; 7] = [
    "Ticker",
    "Sector",
    "Return",
    "MTD_%",
    "Bars",
    "First_Close",
    "Last_Close",
];

const CATEGORY_HEADER: [&str; 3] = ["Sector", "Avg_Return", "Ticker_Count"];

/// Exporter writing the CSV artifact to a fixed path.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    /// Create an exporter targeting `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unique hidden sibling of the output path.
    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "export".into(), |n| n.to_string_lossy());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
    }

    fn io_error(&self, e: &std::io::Error) -> ExportError {
        ExportError::Io {
            message: format!("{}: {e}", self.path.display()),
        }
    }
}

#[async_trait]
impl SnapshotExportPort for CsvExporter {
    async fn export(&self, result: &ResultSet) -> Result<(), ExportError> {
        let body = render_csv(result)?;
        let staging = self.staging_path();

        tokio::fs::write(&staging, body)
            .await
            .map_err(|e| self.io_error(&e))?;

        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging file");
            }
            return Err(self.io_error(&e));
        }

        info!(
            path = %self.path.display(),
            items = result.item_count(),
            categories = result.category_count(),
            "Snapshot exported"
        );
        Ok(())
    }
}

/// Render `result` as the two-block CSV document.
///
/// # Errors
///
/// Returns [`ExportError::Encoding`] if the CSV writer fails.
pub fn render_csv(result: &ResultSet) -> Result<String, ExportError> {
    let mut items = csv::Writer::from_writer(vec![]);
    items.write_record(ITEM_HEADER).map_err(encoding)?;
    for record in &result.items {
        items
            .write_record([
                record.symbol.as_str(),
                record.group.as_str(),
                &format!("{:.6}", record.return_value),
                &format!("{:.2}%", record.percent()),
                &record.bar_count.to_string(),
                &record.first_close.to_string(),
                &record.last_close.to_string(),
            ])
            .map_err(encoding)?;
    }

    let mut categories = csv::Writer::from_writer(vec![]);
    categories.write_record(CATEGORY_HEADER).map_err(encoding)?;
    for category in &result.categories {
        categories
            .write_record([
                category.group.as_str(),
                &format!("{:.6}", category.average_return),
                &category.member_count.to_string(),
            ])
            .map_err(encoding)?;
    }

    let mut out = into_string(items)?;
    out.push('\n');
    out.push_str(&into_string(categories)?);
    Ok(out)
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer.into_inner().map_err(|e| ExportError::Encoding {
        message: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|e| ExportError::Encoding {
        message: e.to_string(),
    })
}

#[allow(clippy::needless_pass_by_value)]
fn encoding(e: csv::Error) -> ExportError {
    ExportError::Encoding {
        message: e.to_string(),
    }
}

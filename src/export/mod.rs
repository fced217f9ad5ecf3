//! Archival of per-season totals into a spreadsheet-like table.

mod json_sheet;

pub use json_sheet::{JsonSheetSink, Sheet, Workbook};

use futures::future::BoxFuture;
use thiserror::Error;

/// Result alias for export calls.
pub type ExportResult<T> = Result<T, ExportError>;

/// Failure while writing to the export table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The backing file could not be read or written.
    #[error("export io failure on `{path}`")]
    Io {
        /// File involved.
        path: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The existing table does not decode.
    #[error("export table `{path}` is corrupt")]
    Corrupt {
        /// File involved.
        path: String,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Tabular sink keyed by member display name, one column per season.
pub trait ExportSink: Send + Sync {
    /// Write the `season_id` column of `sheet`, one row per `(member, points)`.
    ///
    /// Rows for members not listed are left untouched; listed members missing
    /// from the sheet are appended.
    fn write_season_snapshot(
        &self,
        sheet: &str,
        season_id: &str,
        scores: Vec<(String, f64)>,
    ) -> BoxFuture<'static, ExportResult<()>>;

    /// Every archived row of `sheet`; an unknown sheet has no rows.
    fn read_sheet(&self, sheet: &str) -> BoxFuture<'static, ExportResult<Sheet>>;
}

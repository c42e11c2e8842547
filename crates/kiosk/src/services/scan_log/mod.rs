//! Activity logger: one append-only row per scan attempt.
//!
//! # Sinks
//!
//! - [`SheetsSink`] - Google Sheets values API (primary)
//! - [`CsvSink`] - local append-only CSV file (fallback)
//!
//! The sink is chosen once by [`ActivityLogger::initialize`]. If the
//! spreadsheet is not configured or its startup probe fails, the process logs
//! to CSV for the rest of its lifetime; there is no periodic re-probe.
//!
//! Logging is best-effort: [`ActivityLogger::record`] never fails. Append
//! errors are reported to tracing and Sentry and then dropped.

mod csv_file;
mod sheets;

pub use csv_file::CsvSink;
pub use sheets::{SheetsError, SheetsSink};

use checkin_core::{IdentityClaims, PersonRecord, ScanLogEntry, ScanOutcome};
use chrono::Local;
use thiserror::Error;

use crate::config::ScanLogConfig;

/// Errors that can occur while appending a row.
#[derive(Debug, Error)]
pub enum ScanLogError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Row could not be encoded as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet API call failed.
    #[error("spreadsheet error: {0}")]
    Sheets(#[from] SheetsError),
}

/// The durable destination selected at startup.
#[derive(Debug, Clone)]
pub enum ScanLogSink {
    /// Remote spreadsheet.
    Sheets(SheetsSink),
    /// Local CSV file.
    Csv(CsvSink),
}

impl ScanLogSink {
    /// Short name of the sink, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sheets(_) => "spreadsheet",
            Self::Csv(_) => "csv",
        }
    }

    async fn append(&self, entry: &ScanLogEntry) -> Result<(), ScanLogError> {
        match self {
            Self::Sheets(sheets) => sheets.append(entry).await?,
            Self::Csv(csv) => csv.append(entry).await?,
        }
        Ok(())
    }
}

/// Records scan attempts to the selected sink.
#[derive(Debug, Clone)]
pub struct ActivityLogger {
    sink: ScanLogSink,
}

impl ActivityLogger {
    /// Create a logger writing to an already-selected sink.
    #[must_use]
    pub const fn new(sink: ScanLogSink) -> Self {
        Self { sink }
    }

    /// Select the sink for this process.
    ///
    /// Tries the spreadsheet when one is configured and falls back to the CSV
    /// file on any setup failure. Never fails.
    pub async fn initialize(config: &ScanLogConfig) -> Self {
        let csv = CsvSink::new(&config.csv_path);

        let Some(spreadsheet_id) = config.spreadsheet_id.as_deref() else {
            tracing::warn!(
                path = %config.csv_path.display(),
                "Spreadsheet not configured, logging scans to CSV"
            );
            return Self::new(ScanLogSink::Csv(csv));
        };

        match SheetsSink::connect(spreadsheet_id, config).await {
            Ok(sheets) => {
                tracing::info!(spreadsheet_id, "Spreadsheet connected");
                Self::new(ScanLogSink::Sheets(sheets))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %config.csv_path.display(),
                    "Spreadsheet setup failed, logging scans to CSV"
                );
                Self::new(ScanLogSink::Csv(csv))
            }
        }
    }

    /// The active sink.
    #[must_use]
    pub const fn sink(&self) -> &ScanLogSink {
        &self.sink
    }

    /// Record one scan attempt.
    ///
    /// Missing person or actor values are written as placeholders. Failures
    /// are reported and swallowed.
    pub async fn record(
        &self,
        person: Option<&PersonRecord>,
        success: bool,
        actor: Option<&IdentityClaims>,
    ) {
        let entry = ScanLogEntry::new(&Local::now(), person, ScanOutcome::from(success), actor);

        match self.sink.append(&entry).await {
            Ok(()) => tracing::info!(
                sink = self.sink.kind(),
                person_id = %entry.person_id,
                status = %entry.outcome,
                scanned_by = %entry.actor_name,
                "Scan logged"
            ),
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(
                    error = %e,
                    sink = self.sink.kind(),
                    sentry_event_id = %event_id,
                    "Failed to log scan"
                );
            }
        }
    }
}

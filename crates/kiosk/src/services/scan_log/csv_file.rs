//! Local CSV scan log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use checkin_core::{SCAN_LOG_HEADER, ScanLogEntry};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::ScanLogError;

/// Append-only CSV file.
///
/// The header row is written when the file is first created. Every data
/// field is quoted. Appends from concurrent requests are serialised so rows
/// never interleave and the header is written at most once.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CsvSink {
    /// Create a sink for the given path. Nothing is touched until the first append.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file with its header if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be encoded or the file cannot be
    /// created or written.
    pub async fn append(&self, entry: &ScanLogEntry) -> Result<(), ScanLogError> {
        let row = encode_row(entry)?;

        let _guard = self.lock.lock().await;

        let mut bytes = Vec::with_capacity(row.len() + 64);
        if !tokio::fs::try_exists(&self.path).await? {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            bytes.extend_from_slice(header_line().as_bytes());
        }
        bytes.extend_from_slice(&row);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        Ok(())
    }
}

/// Header line, unquoted, newline-terminated.
fn header_line() -> String {
    let mut line = SCAN_LOG_HEADER.join(",");
    line.push('\n');
    line
}

/// Encode a row with every field quoted.
fn encode_row(entry: &ScanLogEntry) -> Result<Vec<u8>, ScanLogError> {
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(&mut buf);
        writer.write_record(entry.to_row())?;
        writer.flush()?;
    }
    Ok(buf)
}

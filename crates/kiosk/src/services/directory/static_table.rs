//! Fixed in-memory directory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use checkin_core::{PersonRecord, ScanId};

/// Built-in badge table used for local and offline operation.
const BUILTIN_ENTRIES: &[(&str, &str, &str)] = &[
    ("1234567890", "John Doe", "jdoe"),
    ("9876543210", "Jane Smith", "jsmith"),
    ("5555555555", "Bob Johnson", "bjohnson"),
    ("1111111111", "Alice Cooper", "acooper"),
    ("2222222222", "Charlie Brown", "cbrown"),
];

/// Directory backed by a fixed table.
///
/// Cheap to clone; the table is shared.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    entries: Arc<HashMap<String, PersonRecord>>,
    latency: Duration,
}

impl StaticDirectory {
    /// Build a directory from `(scan id, name, short id)` triples.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(scan_id, name, short_id)| {
                (scan_id.to_string(), PersonRecord::new(name, short_id))
            })
            .collect();

        Self {
            entries: Arc::new(entries),
            latency: Duration::ZERO,
        }
    }

    /// The built-in badge table.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_ENTRIES.iter().copied())
    }

    /// Delay every lookup, to make the kiosk feel like it is talking to a real backend.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Look up a scan identifier.
    pub async fn lookup(&self, scan_id: &ScanId) -> Option<PersonRecord> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.entries.get(scan_id.as_str()).cloned()
    }

    /// Number of known badges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Scan log rows.
//!
//! One [`ScanLogEntry`] is produced per scan attempt and appended to the
//! active log sink. Rows are never updated or deleted.

use core::fmt;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::{IdentityClaims, PersonRecord};

/// Column headers shared by every sink.
pub const SCAN_LOG_HEADER: [&str; 6] = [
    "Date",
    "Time",
    "Student Name",
    "Andrew ID",
    "Status",
    "Scanned By",
];

/// Placeholder written when the lookup found nobody.
const UNKNOWN_PERSON: &str = "Unknown";
/// Placeholder written for the id column when the lookup found nobody.
const MISSING_ID: &str = "N/A";
/// Placeholder written when no operator identity is available.
const UNKNOWN_ACTOR: &str = "Unknown";

/// Outcome tag for a scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    /// The identifier resolved to a person.
    Success,
    /// The identifier was not found.
    Failure,
}

impl ScanOutcome {
    /// Returns the string written to the status column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl From<bool> for ScanOutcome {
    fn from(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row in the scan log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    /// Local date, `M/D/YYYY`.
    pub date: String,
    /// Local time, `H:MM:SS AM`.
    pub time: String,
    /// Person name, or `Unknown`.
    pub person_name: String,
    /// Person short id, or `N/A`.
    pub person_id: String,
    /// Scan outcome.
    pub outcome: ScanOutcome,
    /// Operator display name, or `Unknown`.
    pub actor_name: String,
}

impl ScanLogEntry {
    /// Build a row for a scan attempt at the given instant.
    ///
    /// Absent person or actor values are replaced by the fixed placeholders.
    #[must_use]
    pub fn new<Tz>(
        at: &DateTime<Tz>,
        person: Option<&PersonRecord>,
        outcome: ScanOutcome,
        actor: Option<&IdentityClaims>,
    ) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self {
            date: at.format("%-m/%-d/%Y").to_string(),
            time: at.format("%-I:%M:%S %p").to_string(),
            person_name: person.map_or_else(
                || UNKNOWN_PERSON.to_string(),
                |p| p.display_name.clone(),
            ),
            person_id: person.map_or_else(|| MISSING_ID.to_string(), |p| p.short_id.clone()),
            outcome,
            actor_name: actor.map_or_else(
                || UNKNOWN_ACTOR.to_string(),
                |a| a.display_name.clone(),
            ),
        }
    }

    /// The row as the six column values, in header order.
    #[must_use]
    pub fn to_row(&self) -> [String; 6] {
        [
            self.date.clone(),
            self.time.clone(),
            self.person_name.clone(),
            self.person_id.clone(),
            self.outcome.as_str().to_string(),
            self.actor_name.clone(),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn test_success_row() {
        let person = PersonRecord::new("John Doe", "jdoe");
        let actor = IdentityClaims::development();
        let entry = ScanLogEntry::new(
            &afternoon(),
            Some(&person),
            ScanOutcome::Success,
            Some(&actor),
        );

        assert_eq!(
            entry.to_row(),
            [
                "3/7/2026".to_string(),
                "2:05:09 PM".to_string(),
                "John Doe".to_string(),
                "jdoe".to_string(),
                "SUCCESS".to_string(),
                "Dev User".to_string(),
            ]
        );
    }

    #[test]
    fn test_placeholders_when_absent() {
        let entry = ScanLogEntry::new(&afternoon(), None, ScanOutcome::Failure, None);
        let row = entry.to_row();
        assert_eq!(&row[2..], ["Unknown", "N/A", "FAILURE", "Unknown"]);
    }

    #[test]
    fn test_midnight_renders_twelve_am() {
        let at = Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 1).unwrap();
        let entry = ScanLogEntry::new(&at, None, ScanOutcome::Failure, None);
        assert_eq!(entry.date, "12/31/2026");
        assert_eq!(entry.time, "12:00:01 AM");
    }

    #[test]
    fn test_outcome_from_bool() {
        assert_eq!(ScanOutcome::from(true), ScanOutcome::Success);
        assert_eq!(ScanOutcome::from(false).to_string(), "FAILURE");
    }

    #[test]
    fn test_header_has_six_columns() {
        assert_eq!(SCAN_LOG_HEADER.len(), 6);
        assert_eq!(SCAN_LOG_HEADER[5], "Scanned By");
    }
}

//! Person records returned by a directory lookup.

use serde::{Deserialize, Serialize};

/// A person resolved from a scan identifier.
///
/// Lives for the duration of one scan request. The wire names (`name`,
/// `andrewid`) are what the kiosk page and the log columns expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Human-readable name shown on the kiosk.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Short directory identifier (campus login id).
    #[serde(rename = "andrewid")]
    pub short_id: String,
}

impl PersonRecord {
    /// Create a new person record.
    #[must_use]
    pub fn new(display_name: impl Into<String>, short_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            short_id: short_id.into(),
        }
    }
}

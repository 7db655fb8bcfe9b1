//! Core types for trove
//!
//! A [`FileRecord`] describes one observed file. The producer keeps them in a
//! persisted table ([`PersistedRecord`], keyed by `path`); the consumer compares
//! them by content identity ([`DriftKey`], i.e. `name` + `content_hash`) and
//! emits [`DifferenceEntry`] values.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Timestamp helpers
// ============================================================================

/// Wire format for timestamps: local time, whole seconds, no offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Render a timestamp the way the inventory document carries it.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an ISO-8601 local timestamp. Fractional seconds are accepted and kept.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Serde adapter for [`NaiveDateTime`] using [`TIMESTAMP_FORMAT`]
pub mod iso_seconds {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

// ============================================================================
// File Types
// ============================================================================

/// Identity and content descriptor of one observed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Base filename
    pub name: String,
    /// Full path as scanned
    pub path: String,
    /// MD5 of the whole content, lowercase hex
    pub content_hash: String,
    /// Size in bytes
    pub size: u64,
    /// See `extractor` for which filesystem timestamp this is
    #[serde(with = "iso_seconds")]
    pub created_at: NaiveDateTime,
    /// Lower-cased suffix including the dot, or empty
    pub extension: String,
    /// Best-effort MIME type guessed from the name
    pub content_type: Option<String>,
}

impl FileRecord {
    /// Content identity used by drift comparison.
    pub fn drift_key(&self) -> DriftKey<'_> {
        DriftKey {
            name: &self.name,
            content_hash: &self.content_hash,
        }
    }

    /// Whether a stored copy must be rewritten to match `self`.
    ///
    /// Only hash and size count; timestamps, name, extension and type are
    /// refreshed as part of an update but never cause one.
    pub fn content_differs(&self, other: &FileRecord) -> bool {
        self.content_hash != other.content_hash || self.size != other.size
    }
}

/// A [`FileRecord`] stored in the persisted table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Surrogate key assigned by the store
    pub id: i64,
    #[serde(flatten)]
    pub file: FileRecord,
}

impl PersistedRecord {
    pub fn path(&self) -> &str {
        &self.file.path
    }
}

/// `(name, content_hash)`: two records with equal keys are the same logical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriftKey<'a> {
    pub name: &'a str,
    pub content_hash: &'a str,
}

// ============================================================================
// Difference Types
// ============================================================================

/// Classification of a drift difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Present locally, absent from the reference snapshot
    ExtraLocal,
    /// Present in the reference snapshot, absent locally
    MissingLocal,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtraLocal => "extra_local",
            Self::MissingLocal => "missing_local",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One drift difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DifferenceEntry {
    ExtraLocal { local: FileRecord },
    MissingLocal { reference: FileRecord },
}

impl DifferenceEntry {
    pub fn kind(&self) -> DiffKind {
        match self {
            Self::ExtraLocal { .. } => DiffKind::ExtraLocal,
            Self::MissingLocal { .. } => DiffKind::MissingLocal,
        }
    }

    /// The record this entry is about, whichever side it came from.
    pub fn record(&self) -> &FileRecord {
        match self {
            Self::ExtraLocal { local } => local,
            Self::MissingLocal { reference } => reference,
        }
    }
}

// ============================================================================
// Anomalies
// ============================================================================

/// Condition that a real filesystem scan cannot produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityAnomaly {
    /// Several observed records share one path; the last one was kept
    DuplicateObservedPath { path: String, occurrences: usize },
}

impl fmt::Display for IntegrityAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateObservedPath { path, occurrences } => write!(
                f,
                "path '{}' observed {} times in one scan, last occurrence kept",
                path, occurrences
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> FileRecord {
        FileRecord {
            name: "x.jpg".to_string(),
            path: "/srv/images/x.jpg".to_string(),
            content_hash: "5d41402abc4b2a76b9719d911017c592".to_string(),
            size: 5,
            created_at: NaiveDate::from_ymd_opt(2025, 10, 4)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            extension: ".jpg".to_string(),
            content_type: Some("image/jpeg".to_string()),
        }
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = sample().created_at;
        assert_eq!(format_timestamp(&ts), "2025-10-04T09:30:00");
        assert_eq!(parse_timestamp("2025-10-04T09:30:00"), Some(ts));
    }

    #[test]
    fn test_parse_timestamp_accepts_fraction() {
        let parsed = parse_timestamp("2025-10-04T09:30:00.250000").unwrap();
        assert_eq!(format_timestamp(&parsed), "2025-10-04T09:30:00");
        assert!(parse_timestamp("04/10/2025").is_none());
    }

    #[test]
    fn test_content_differs_ignores_timestamp() {
        let a = sample();
        let mut b = a.clone();
        b.created_at = b.created_at + chrono::Duration::hours(3);
        b.content_type = None;
        assert!(!a.content_differs(&b));

        b.size = 6;
        assert!(a.content_differs(&b));
    }

    #[test]
    fn test_difference_entry_serialization() {
        let entry = DifferenceEntry::MissingLocal { reference: sample() };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "missing_local");
        assert_eq!(json["reference"]["created_at"], "2025-10-04T09:30:00");

        let parsed: DifferenceEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.kind(), DiffKind::MissingLocal);
        assert_eq!(parsed.record().name, "x.jpg");
    }
}

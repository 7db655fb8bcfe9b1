//! Inventory exporter and document parser
//!
//! The inventory document is the wire format between producer and consumer:
//! a UTF-8 JSON array of flat records, 4-space indented, fields in the
//! persisted column order:
//!
//! ```json
//! [
//!     {
//!         "id": 1,
//!         "name": "x.jpg",
//!         "path": "/srv/images/x.jpg",
//!         "content_hash": "5d41402abc4b2a76b9719d911017c592",
//!         "size": 5,
//!         "created_at": "2025-10-04T09:30:00",
//!         "extension": ".jpg",
//!         "content_type": "image/jpeg"
//!     }
//! ]
//! ```
//!
//! `created_at` is local time without an offset, so producer and consumer
//! in different timezones see shifted values. Drift comparison ignores it.

use crate::error::{CoreError, Result};
use crate::types::{format_timestamp, parse_timestamp, FileRecord, PersistedRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// One record of the inventory document
///
/// Field order is the persisted column order and is what the serializer emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub content_hash: String,
    pub size: u64,
    /// Empty when the document did not carry a timestamp
    pub created_at: String,
    pub extension: String,
    pub content_type: Option<String>,
}

impl From<&PersistedRecord> for InventoryEntry {
    fn from(record: &PersistedRecord) -> Self {
        let file = &record.file;
        Self {
            id: record.id,
            name: file.name.clone(),
            path: file.path.clone(),
            content_hash: file.content_hash.clone(),
            size: file.size,
            created_at: format_timestamp(&file.created_at),
            extension: file.extension.clone(),
            content_type: file.content_type.clone(),
        }
    }
}

impl InventoryEntry {
    /// Back to a [`FileRecord`]; a missing timestamp becomes the Unix epoch.
    pub fn to_file_record(&self) -> FileRecord {
        FileRecord {
            name: self.name.clone(),
            path: self.path.clone(),
            content_hash: self.content_hash.clone(),
            size: self.size,
            created_at: parse_timestamp(&self.created_at).unwrap_or_else(NaiveDateTime::default),
            extension: self.extension.clone(),
            content_type: self.content_type.clone(),
        }
    }
}

/// The portable form of the persisted record set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryDocument {
    pub entries: Vec<InventoryEntry>,
}

/// Build the document for `records`, keeping their order.
pub fn export(records: &[PersistedRecord]) -> InventoryDocument {
    InventoryDocument {
        entries: records.iter().map(InventoryEntry::from).collect(),
    }
}

impl InventoryDocument {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize with 4-space indentation, non-ASCII kept as-is.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|e| CoreError::malformed(e.to_string()))
    }

    /// Write the document to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CoreError::from_io(parent, e))?;
            }
        }
        let json = self.to_json_pretty()?;
        fs::write(path, json).map_err(|e| CoreError::from_io(path, e))?;
        tracing::info!(path = %path.display(), records = self.len(), "Inventory exported");
        Ok(())
    }

    /// Read and validate a document from disk.
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CoreError::from_io(path, e))?;
        Self::from_json(&text)
    }

    /// Parse and validate a document.
    ///
    /// Required per record: `id`, `name`, `path`, `content_hash` (32 hex
    /// digits), `size`. Optional: `created_at` (ISO-8601), `extension`,
    /// `content_type`. Unknown fields are ignored. Errors name the record index
    /// and the field.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::malformed(format!("not valid JSON: {}", e)))?;
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(CoreError::malformed(format!(
                    "expected a JSON array of records, found {}",
                    json_type(&other)
                )))
            }
        };

        let entries = items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(fields) => parse_entry(index, fields),
                other => Err(CoreError::malformed(format!(
                    "record {}: expected an object, found {}",
                    index,
                    json_type(other)
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    pub fn to_file_records(&self) -> Vec<FileRecord> {
        self.entries.iter().map(InventoryEntry::to_file_record).collect()
    }
}

fn parse_entry(index: usize, fields: &Map<String, Value>) -> Result<InventoryEntry> {
    let missing = |field: &str| CoreError::malformed(format!("record {}: missing field '{}'", index, field));
    let invalid = |field: &str, expected: &str| {
        CoreError::malformed(format!("record {}: field '{}' must be {}", index, field, expected))
    };

    let required_str = |field: &str| -> Result<String> {
        match fields.get(field) {
            None | Some(Value::Null) => Err(missing(field)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(invalid(field, "a string")),
        }
    };
    let optional_str = |field: &str| -> Result<Option<String>> {
        match fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(field, "a string or null")),
        }
    };

    let id = match fields.get("id") {
        None | Some(Value::Null) => return Err(missing("id")),
        Some(v) => v.as_i64().ok_or_else(|| invalid("id", "an integer"))?,
    };
    let size = match fields.get("size") {
        None | Some(Value::Null) => return Err(missing("size")),
        Some(v) => v.as_u64().ok_or_else(|| invalid("size", "a non-negative integer"))?,
    };

    let name = required_str("name")?;
    let path = required_str("path")?;
    let content_hash = required_str("content_hash")?;
    if !is_md5_hex(&content_hash) {
        return Err(invalid("content_hash", "32 hexadecimal digits"));
    }

    let created_at = match optional_str("created_at")? {
        None => String::new(),
        Some(raw) => {
            let ts = parse_timestamp(&raw).ok_or_else(|| invalid("created_at", "an ISO-8601 timestamp"))?;
            format_timestamp(&ts)
        }
    };

    Ok(InventoryEntry {
        id,
        name,
        path,
        content_hash: content_hash.to_ascii_lowercase(),
        size,
        created_at,
        extension: optional_str("extension")?.unwrap_or_default(),
        content_type: optional_str("content_type")?,
    })
}

fn is_md5_hex(value: &str) -> bool {
    value.len() == 32 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const HELLO: &str = "5d41402abc4b2a76b9719d911017c592";

    fn persisted(id: i64, name: &str) -> PersistedRecord {
        PersistedRecord {
            id,
            file: FileRecord {
                name: name.to_string(),
                path: format!("/srv/{}", name),
                content_hash: HELLO.to_string(),
                size: 5,
                created_at: NaiveDate::from_ymd_opt(2025, 10, 4)
                    .unwrap()
                    .and_hms_opt(9, 30, 0)
                    .unwrap(),
                extension: ".jpg".to_string(),
                content_type: Some("image/jpeg".to_string()),
            },
        }
    }

    #[test]
    fn test_export_field_order_and_indent() {
        let doc = export(&[persisted(1, "x.jpg")]);
        let json = doc.to_json_pretty().unwrap();

        let keys = ["\"id\"", "\"name\"", "\"path\"", "\"content_hash\"", "\"size\"", "\"created_at\"", "\"extension\"", "\"content_type\""];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "field order: {json}");

        assert!(json.contains("\n        \"id\": 1,"));
        assert!(json.contains("\"created_at\": \"2025-10-04T09:30:00\""));
    }

    #[test]
    fn test_export_keeps_non_ascii() {
        let doc = export(&[persisted(1, "año_señal.jpg")]);
        let json = doc.to_json_pretty().unwrap();
        assert!(json.contains("año_señal.jpg"));
    }

    #[test]
    fn test_export_then_parse() {
        let records = vec![persisted(1, "x.jpg"), persisted(2, "y.jpg")];
        let doc = export(&records);
        let parsed = InventoryDocument::from_json(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, doc);

        let files = parsed.to_file_records();
        assert_eq!(files[0], records[0].file);
    }

    #[test]
    fn test_write_and_read_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/nested/inventory.json");
        let doc = export(&[persisted(4, "z.png")]);

        doc.write_to(&path).unwrap();
        assert_eq!(InventoryDocument::read_from(&path).unwrap(), doc);
    }

    #[test]
    fn test_from_json_optional_fields() {
        let text = format!(
            r#"[{{"id": 3, "name": "a", "path": "/a", "content_hash": "{}", "size": 0, "created_at": null, "extra": true}}]"#,
            HELLO.to_uppercase()
        );
        let doc = InventoryDocument::from_json(&text).unwrap();
        let entry = &doc.entries[0];
        assert_eq!(entry.content_hash, HELLO);
        assert_eq!(entry.created_at, "");
        assert_eq!(entry.extension, "");
        assert!(entry.content_type.is_none());
        assert_eq!(entry.to_file_record().created_at, NaiveDateTime::default());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let cases = [
            (r#"{"id": 1}"#, "expected a JSON array"),
            (r#"[1]"#, "record 0: expected an object"),
            (r#"[{"name": "a", "path": "/a", "content_hash": "5d41402abc4b2a76b9719d911017c592", "size": 1}]"#, "missing field 'id'"),
            (r#"[{"id": 1, "path": "/a", "content_hash": "5d41402abc4b2a76b9719d911017c592", "size": 1}]"#, "missing field 'name'"),
            (r#"[{"id": 1, "name": "a", "path": "/a", "content_hash": "abc", "size": 1}]"#, "'content_hash' must be 32 hexadecimal digits"),
            (r#"[{"id": 1, "name": "a", "path": "/a", "content_hash": "5d41402abc4b2a76b9719d911017c592", "size": -1}]"#, "'size' must be a non-negative integer"),
            (r#"[{"id": 1, "name": "a", "path": "/a", "content_hash": "5d41402abc4b2a76b9719d911017c592", "size": 1, "created_at": "yesterday"}]"#, "'created_at' must be an ISO-8601 timestamp"),
            ("not json", "not valid JSON"),
        ];

        for (text, expected) in cases {
            let err = InventoryDocument::from_json(text).unwrap_err();
            assert!(matches!(err, CoreError::MalformedDocument(_)));
            assert!(err.to_string().contains(expected), "{text}: {err}");
        }
    }

    #[test]
    fn test_empty_document() {
        let doc = export(&[]);
        assert_eq!(doc.to_json_pretty().unwrap(), "[]");
        assert!(InventoryDocument::from_json("[]").unwrap().is_empty());
    }
}

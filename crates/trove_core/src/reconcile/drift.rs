//! Drift comparison: content-keyed reconciliation
//!
//! Compares a local scan with a reference snapshot by `(name, content_hash)`.
//! It is a symmetric set difference over that key; there is no "modified"
//! classification. A file whose content changed shows up once as
//! [`DifferenceEntry::ExtraLocal`] (new hash) and once as
//! [`DifferenceEntry::MissingLocal`] (old hash).

use crate::types::{DiffKind, DifferenceEntry, DriftKey, FileRecord};
use std::collections::HashSet;

/// Compare `local` against `reference`.
///
/// Output does not depend on input order: entries are deduplicated by key
/// (first occurrence kept) and sorted by name, hash, then kind.
pub fn compare(local: &[FileRecord], reference: &[FileRecord]) -> Vec<DifferenceEntry> {
    let local_keys: HashSet<DriftKey<'_>> = local.iter().map(FileRecord::drift_key).collect();
    let reference_keys: HashSet<DriftKey<'_>> =
        reference.iter().map(FileRecord::drift_key).collect();

    let mut differences = Vec::new();

    let mut seen = HashSet::new();
    for record in local {
        let key = record.drift_key();
        if !reference_keys.contains(&key) && seen.insert(key) {
            differences.push(DifferenceEntry::ExtraLocal {
                local: record.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for record in reference {
        let key = record.drift_key();
        if !local_keys.contains(&key) && seen.insert(key) {
            differences.push(DifferenceEntry::MissingLocal {
                reference: record.clone(),
            });
        }
    }

    differences.sort_by(|a, b| {
        a.record()
            .drift_key()
            .cmp(&b.record().drift_key())
            .then_with(|| a.kind().cmp(&b.kind()))
    });

    differences
}

/// Per-kind totals of a difference set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftCounts {
    pub extra_local: usize,
    pub missing_local: usize,
}

impl DriftCounts {
    pub fn of(differences: &[DifferenceEntry]) -> Self {
        differences
            .iter()
            .fold(Self::default(), |mut counts, entry| {
                match entry.kind() {
                    DiffKind::ExtraLocal => counts.extra_local += 1,
                    DiffKind::MissingLocal => counts.missing_local += 1,
                }
                counts
            })
    }

    pub fn total(&self) -> usize {
        self.extra_local + self.missing_local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn rec(name: &str, hash: &str, path: &str) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            path: path.to_string(),
            content_hash: hash.to_string(),
            size: 1,
            created_at: NaiveDateTime::default(),
            extension: String::new(),
            content_type: None,
        }
    }

    #[test]
    fn test_extra_local_only() {
        let reference = vec![rec("x.jpg", "abc", "/remote/x.jpg")];
        let local = vec![rec("x.jpg", "abc", "/local/x.jpg"), rec("y.jpg", "def", "/local/y.jpg")];

        let diffs = compare(&local, &reference);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind(), DiffKind::ExtraLocal);
        assert_eq!(diffs[0].record().name, "y.jpg");
    }

    #[test]
    fn test_changed_content_is_extra_and_missing() {
        let reference = vec![rec("x.jpg", "abc", "/remote/x.jpg")];
        let local = vec![rec("x.jpg", "zzz", "/local/x.jpg")];

        let diffs = compare(&local, &reference);
        assert_eq!(diffs.len(), 2);
        assert_eq!(
            diffs[0],
            DifferenceEntry::MissingLocal {
                reference: rec("x.jpg", "abc", "/remote/x.jpg")
            }
        );
        assert_eq!(
            diffs[1],
            DifferenceEntry::ExtraLocal {
                local: rec("x.jpg", "zzz", "/local/x.jpg")
            }
        );
        assert_eq!(
            DriftCounts::of(&diffs),
            DriftCounts {
                extra_local: 1,
                missing_local: 1
            }
        );
    }

    #[test]
    fn test_path_is_not_identity() {
        let reference = vec![rec("x.jpg", "abc", "/a/x.jpg")];
        let local = vec![rec("x.jpg", "abc", "/somewhere/else/x.jpg")];
        assert!(compare(&local, &reference).is_empty());
    }

    #[test]
    fn test_duplicate_keys_produce_one_entry() {
        let local = vec![rec("x.jpg", "abc", "/l/1/x.jpg"), rec("x.jpg", "abc", "/l/2/x.jpg")];
        let diffs = compare(&local, &[]);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].record().path, "/l/1/x.jpg");
    }

    #[test]
    fn test_compare_with_self_is_empty() {
        let set = vec![rec("a", "1", "/a"), rec("b", "2", "/b")];
        assert!(compare(&set, &set).is_empty());
    }
}

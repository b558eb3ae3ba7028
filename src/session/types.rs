// Session data model

use serde::{Deserialize, Serialize};

/// Result of processing one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Name of the uploaded file.
    pub filename: String,
    /// Sum of the numbers in the file's array.
    pub sum: i64,
}

/// All files processed within one session, in arrival order.
///
/// Owned by the store entry keyed by the session identifier; only ever
/// mutated by append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub files: Vec<FileRecord>,
}

impl SessionRecord {
    /// Start a record from its first processed file.
    pub fn new(first: FileRecord) -> Self {
        Self { files: vec![first] }
    }

    pub fn append(&mut self, file: FileRecord) {
        self.files.push(file);
    }
}

/// A stored record together with its write version.
///
/// The version is the optimistic-concurrency token for `update`: it starts
/// at 1 on create and increments on every successful update, so a stale
/// read-modify-write cycle is detected instead of silently dropping an
/// append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub version: u64,
    #[serde(flatten)]
    pub record: SessionRecord,
}

impl VersionedRecord {
    pub fn initial(record: SessionRecord) -> Self {
        Self { version: 1, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_in_order() {
        let mut record = SessionRecord::new(FileRecord {
            filename: "a.json".to_string(),
            sum: 10,
        });
        record.append(FileRecord {
            filename: "b.json".to_string(),
            sum: 5,
        });

        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[0].filename, "a.json");
        assert_eq!(record.files[1].filename, "b.json");
    }

    #[test]
    fn test_versioned_record_serializes_flat() {
        let versioned = VersionedRecord::initial(SessionRecord::new(FileRecord {
            filename: "a.json".to_string(),
            sum: 10,
        }));

        let json = serde_json::to_value(&versioned).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["files"][0]["filename"], "a.json");
        assert_eq!(json["files"][0]["sum"], 10);
    }
}

//! Versioned JSON document holding one entity collection.

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;
use todo_domain::Entity;
use tracing::warn;

use crate::{StoreError, StoreResult};

pub const FORMAT_VERSION: &str = "1.0";
const SUPPORTED_MAJOR: u32 = 1;

/// A record that was present in the document but could not be adopted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

/// Result of decoding a document.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRecord>,
    pub version: String,
    pub saved_at: Option<DateTime<Utc>>,
}

struct Document<'a, T> {
    records: &'a [&'a T],
    saved_at: DateTime<Utc>,
}

impl<T: Entity> Serialize for Document<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("version", FORMAT_VERSION)?;
        map.serialize_entry(T::COLLECTION, self.records)?;
        map.serialize_entry(
            "saved_at",
            &self.saved_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        )?;
        map.end()
    }
}

pub fn encode<T: Entity>(path: &Path, records: &[&T], saved_at: DateTime<Utc>) -> StoreResult<String> {
    let document = Document { records, saved_at };
    serde_json::to_string_pretty(&document).map_err(|err| StoreError::Serde {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Decodes a document. Whole-document problems are errors; individual bad
/// records are skipped and reported.
pub fn decode<T: Entity>(path: &Path, text: &str) -> StoreResult<Decoded<T>> {
    let root: Value = serde_json::from_str(text).map_err(|err| StoreError::Serde {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let Value::Object(mut root) = root else {
        return Err(StoreError::corrupted(path, "document root is not an object"));
    };

    let version = match root.get("version") {
        None => FORMAT_VERSION.to_string(),
        Some(Value::String(version)) => version.clone(),
        Some(_) => return Err(StoreError::corrupted(path, "version is not a string")),
    };
    let major = version
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u32>().ok())
        .ok_or_else(|| StoreError::corrupted(path, format!("unparseable version `{version}`")))?;
    if major > SUPPORTED_MAJOR {
        return Err(StoreError::corrupted(
            path,
            format!("unsupported format version `{version}`"),
        ));
    }

    let saved_at = root
        .get("saved_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc));

    let items = match root.remove(T::COLLECTION) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(StoreError::corrupted(
                path,
                format!("`{}` is not an array", T::COLLECTION),
            ))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let reason = match serde_json::from_value::<T>(item) {
            Err(err) => err.to_string(),
            Ok(entity) => match entity.validate() {
                Err(err) => err.to_string(),
                Ok(()) if !seen.insert(entity.id()) => format!("duplicate id {}", entity.id()),
                Ok(()) => {
                    records.push(entity);
                    continue;
                }
            },
        };
        warn!(
            path = %path.display(),
            kind = T::KIND,
            index,
            reason = %reason,
            "skipping unreadable record"
        );
        skipped.push(SkippedRecord { index, reason });
    }

    Ok(Decoded {
        records,
        skipped,
        version,
        saved_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use todo_domain::{Priority, Task};

    fn path() -> &'static Path {
        Path::new("tasks.json")
    }

    #[test]
    fn encoded_document_lists_version_collection_and_timestamp() {
        let task = Task::new("Write report").with_priority(Priority::High);
        let text = encode(path(), &[&task], Utc::now()).expect("encode");
        let value: Value = serde_json::from_str(&text).expect("parse");
        let keys: Vec<&String> = value.as_object().expect("object").keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(value["version"], FORMAT_VERSION);
        assert_eq!(value["tasks"][0]["priority"], "high");
        assert!(value["tasks"][0]["due_date"].is_null());
        assert!(value["saved_at"].as_str().expect("saved_at").ends_with('Z'));
    }

    #[test]
    fn invalid_and_duplicate_records_are_skipped() {
        let keep = Task::new("Keep me");
        let keep_record = serde_json::to_value(&keep).expect("record");
        let text = json!({
            "version": "1.0",
            "tasks": [keep_record.clone(), { "title": "" }, "not a record", keep_record],
        })
        .to_string();
        let decoded = decode::<Task>(path(), &text).expect("decode");
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].id, keep.id);
        let indexes: Vec<usize> = decoded.skipped.iter().map(|skip| skip.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert!(decoded.skipped[2].reason.contains("duplicate"));
    }

    #[test]
    fn missing_collection_decodes_empty() {
        let decoded = decode::<Task>(path(), r#"{"version":"1.0"}"#).expect("decode");
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.saved_at, None);
    }

    #[test]
    fn structural_problems_are_corruption() {
        for text in [
            "[1, 2, 3]",
            r#"{"version": 1, "tasks": []}"#,
            r#"{"version": "2.0", "tasks": []}"#,
            r#"{"version": "1.0", "tasks": {}}"#,
            "{\"version\": \"1.0\", \"tasks\": [",
        ] {
            let err = decode::<Task>(path(), text).expect_err(text);
            assert!(err.is_corruption(), "{text} -> {err}");
        }
    }

    #[test]
    fn minor_versions_are_accepted() {
        let decoded = decode::<Task>(path(), r#"{"version":"1.3","tasks":[]}"#).expect("decode");
        assert_eq!(decoded.version, "1.3");
    }
}

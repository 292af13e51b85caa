//! Loosely typed field values used for filtering, sorting and named updates.

use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

/// A single field value read from, or destined for, an entity.
///
/// Ordering is the natural ordering within a variant. `Null` sorts before
/// everything, which is how missing fields are ordered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Enumerated value: compared by rank, matched and searched by label.
    Ranked { rank: u8, label: &'static str },
    Text(String),
    Id(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Equality used by filters. Enumerations, identifiers and dates also
    /// match their canonical string form.
    pub fn matches(&self, expected: &FieldValue) -> bool {
        match (self, expected) {
            (FieldValue::Ranked { label, .. }, FieldValue::Text(text))
            | (FieldValue::Text(text), FieldValue::Ranked { label, .. }) => *label == text.as_str(),
            (FieldValue::Ranked { label: a, .. }, FieldValue::Ranked { label: b, .. }) => a == b,
            (FieldValue::Id(id), FieldValue::Text(text))
            | (FieldValue::Text(text), FieldValue::Id(id)) => Uuid::parse_str(text)
                .map(|parsed| parsed == *id)
                .unwrap_or(false),
            (FieldValue::Date(date), FieldValue::Text(text))
            | (FieldValue::Text(text), FieldValue::Date(date)) => {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(|parsed| parsed == *date)
                    .unwrap_or(false)
            }
            (left, right) => left == right,
        }
    }

    /// String form used by substring search. Empty values are not searchable.
    pub fn search_text(&self) -> Option<String> {
        let text = match self {
            FieldValue::Null => return None,
            FieldValue::Bool(false) | FieldValue::Int(0) => return None,
            FieldValue::List(items) if items.is_empty() => return None,
            FieldValue::Text(text) if text.is_empty() => return None,
            other => other.to_string(),
        };
        Some(text)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Ranked { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<Uuid> {
        match self {
            FieldValue::Id(id) => Some(*id),
            FieldValue::Text(text) => Uuid::parse_str(text).ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::Text(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(at) => Some(*at),
            FieldValue::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str(""),
            FieldValue::Bool(value) => write!(f, "{value}"),
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::Ranked { label, .. } => f.write_str(label),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Id(id) => write!(f, "{}", id.hyphenated()),
            FieldValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            FieldValue::Timestamp(at) => {
                f.write_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Id(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_before_values() {
        let mut values = vec![
            FieldValue::Text("b".into()),
            FieldValue::Null,
            FieldValue::Text("a".into()),
        ];
        values.sort();
        assert_eq!(values[0], FieldValue::Null);
        assert_eq!(values[1], FieldValue::Text("a".into()));
    }

    #[test]
    fn ranked_values_match_their_label() {
        let value = FieldValue::Ranked {
            rank: 3,
            label: "high",
        };
        assert!(value.matches(&FieldValue::from("high")));
        assert!(!value.matches(&FieldValue::from("low")));
    }

    #[test]
    fn ids_match_their_string_form() {
        let id = Uuid::new_v4();
        assert!(FieldValue::Id(id).matches(&FieldValue::Text(id.to_string())));
    }

    #[test]
    fn empty_values_are_not_searchable() {
        assert_eq!(FieldValue::Null.search_text(), None);
        assert_eq!(FieldValue::Text(String::new()).search_text(), None);
        assert_eq!(
            FieldValue::List(vec!["home".into(), "errand".into()]).search_text(),
            Some("home errand".into())
        );
    }
}

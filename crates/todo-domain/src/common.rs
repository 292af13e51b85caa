//! Shared traits for entities managed by an entity store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{DomainError, FieldValue};

/// Exposes a stable identifier for stored entities.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Contract every type kept in an entity store must satisfy.
///
/// Record conversion is provided by serde: the flat JSON object produced by
/// `Serialize` is the on-disk record, and `Deserialize` rebuilds it. Field
/// access by name backs filtering, sorting and search; the associated
/// [`Entity::Change`] type enumerates the fields an update may touch.
pub trait Entity:
    Identifiable + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Tagged change set applied by `update`.
    type Change: Clone + fmt::Debug + Send + Sync;

    /// Singular lowercase type name, e.g. `task`.
    const KIND: &'static str;

    /// Key of the record array in the persisted document, e.g. `tasks`.
    const COLLECTION: &'static str;

    /// Replaces the identifier. Stores only call this for entities whose id is nil.
    fn set_id(&mut self, id: Uuid);

    /// Checks entity invariants. The default accepts everything.
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }

    /// Refreshes the last-modified timestamp, if the entity tracks one.
    fn touch(&mut self, _now: DateTime<Utc>) {}

    /// Returns the value of a named field, or `None` when the entity has no such field.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Applies a single change in place.
    fn apply(&mut self, change: &Self::Change);

    /// Builds a change from a field name and loosely typed value.
    fn parse_change(field: &str, value: FieldValue) -> Result<Self::Change, DomainError>;
}

/// Enumerations stored as lowercase strings but ordered by rank.
pub trait Ranked: Copy + Sized {
    fn rank(self) -> u8;
    fn as_str(self) -> &'static str;
    fn parse(value: &str) -> Option<Self>;

    fn to_field(self) -> FieldValue {
        FieldValue::Ranked {
            rank: self.rank(),
            label: self.as_str(),
        }
    }
}

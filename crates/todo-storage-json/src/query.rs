//! Field-based filtering, sorting and paging over stored entities.

use std::{cmp::Ordering, convert::Infallible, str::FromStr};

use todo_domain::{Entity, FieldValue};

/// Expected value for one filtered field.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Eq(FieldValue),
    AnyOf(Vec<FieldValue>),
}

impl Expected {
    pub fn accepts(&self, actual: &FieldValue) -> bool {
        match self {
            Expected::Eq(expected) => actual.matches(expected),
            Expected::AnyOf(options) => options.iter().any(|option| actual.matches(option)),
        }
    }
}

/// Conjunction of field conditions. An entity without the field is compared as `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Expected)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditions
            .push((field.into(), Expected::Eq(value.into())));
        self
    }

    pub fn any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions
            .push((field.into(), Expected::AnyOf(values)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches<T: Entity>(&self, entity: &T) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            let actual = entity.field(field).unwrap_or(FieldValue::Null);
            expected.accepts(&actual)
        })
    }
}

/// Sort key. `"-priority"` parses as priority, descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn compare<T: Entity>(&self, left: &T, right: &T) -> Ordering {
        let left = left.field(&self.field).unwrap_or(FieldValue::Null);
        let right = right.field(&self.field).unwrap_or(FieldValue::Null);
        let ordering = left.cmp(&right);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl FromStr for SortSpec {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Ok(match value.strip_prefix('-') {
            Some(field) => SortSpec::descending(field),
            None => SortSpec::ascending(value),
        })
    }
}

impl From<&str> for SortSpec {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(spec) => spec,
            Err(never) => match never {},
        }
    }
}

/// Parameters for `EntityStore::list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub sort: Option<SortSpec>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort_by(mut self, sort: impl Into<SortSpec>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filters, stably sorts and pages `entities`, which arrive in insertion order.
    pub fn apply<'a, T: Entity>(&self, entities: impl Iterator<Item = &'a T>) -> Vec<T> {
        let mut selected: Vec<&T> = entities.filter(|entity| self.filter.matches(*entity)).collect();
        if let Some(sort) = &self.sort {
            selected.sort_by(|left, right| sort.compare(*left, *right));
        }
        selected
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

//! Domain types representing todo items.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::*, DomainError, FieldValue};

pub const TASK_TITLE_MAX: usize = 200;
pub const DEFAULT_PROJECT: &str = "Inbox";

/// A single todo item.
///
/// Optional fields are serialized as explicit `null` so a saved file carries
/// every key of the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Minutes.
    #[serde(default)]
    pub estimated_time: Option<u32>,
    /// Minutes.
    #[serde(default)]
    pub actual_time: Option<u32>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub position: i32,
}

fn default_project() -> String {
    DEFAULT_PROJECT.into()
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            project: default_project(),
            tags: Vec::new(),
            due_date: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            estimated_time: None,
            actual_time: None,
            parent_id: None,
            position: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Marks the task completed and records the completion time.
    pub fn mark_done(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Done;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_undone(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Todo;
        self.completed_at = None;
        self.updated_at = now;
    }

    pub fn toggle_done(&mut self, now: DateTime<Utc>) {
        if self.is_done() {
            self.mark_undone(now);
        } else {
            self.mark_done(now);
        }
    }
}

impl Identifiable for Task {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Task {
    type Change = TaskChange;

    const KIND: &'static str = "task";
    const COLLECTION: &'static str = "tasks";

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("Task title cannot be empty"));
        }
        if self.title.chars().count() > TASK_TITLE_MAX {
            return Err(DomainError::validation(format!(
                "Task title cannot exceed {TASK_TITLE_MAX} characters"
            )));
        }
        if self.parent_id == Some(self.id) {
            return Err(DomainError::validation("Task cannot be its own parent"));
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let value: FieldValue = match name {
            "id" => self.id.into(),
            "title" => self.title.as_str().into(),
            "description" => self.description.as_str().into(),
            "status" => self.status.to_field(),
            "priority" => self.priority.to_field(),
            "project" => self.project.as_str().into(),
            "tags" => self.tags.clone().into(),
            "due_date" => self.due_date.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            "completed_at" => self.completed_at.into(),
            "estimated_time" => self.estimated_time.into(),
            "actual_time" => self.actual_time.into(),
            "parent_id" => self.parent_id.into(),
            "position" => self.position.into(),
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, change: &TaskChange) {
        match change {
            TaskChange::Title(title) => self.title = title.clone(),
            TaskChange::Description(description) => self.description = description.clone(),
            TaskChange::Status(status) => self.status = *status,
            TaskChange::Priority(priority) => self.priority = *priority,
            TaskChange::Project(project) => self.project = project.clone(),
            TaskChange::Tags(tags) => self.tags = tags.clone(),
            TaskChange::DueDate(due_date) => self.due_date = *due_date,
            TaskChange::CompletedAt(at) => self.completed_at = *at,
            TaskChange::EstimatedTime(minutes) => self.estimated_time = *minutes,
            TaskChange::ActualTime(minutes) => self.actual_time = *minutes,
            TaskChange::ParentId(parent) => self.parent_id = *parent,
            TaskChange::Position(position) => self.position = *position,
        }
    }

    fn parse_change(field: &str, value: FieldValue) -> Result<TaskChange, DomainError> {
        let change = match field {
            "title" => TaskChange::Title(text(field, &value)?),
            "description" => TaskChange::Description(text(field, &value)?),
            "status" => TaskChange::Status(ranked(field, &value)?),
            "priority" => TaskChange::Priority(ranked(field, &value)?),
            "project" => TaskChange::Project(text(field, &value)?),
            "tags" => TaskChange::Tags(
                value
                    .into_list()
                    .ok_or_else(|| DomainError::invalid_value(field, "list of strings"))?,
            ),
            "due_date" => TaskChange::DueDate(optional(field, &value, "date", FieldValue::as_date)?),
            "completed_at" => TaskChange::CompletedAt(optional(
                field,
                &value,
                "timestamp",
                FieldValue::as_timestamp,
            )?),
            "estimated_time" => TaskChange::EstimatedTime(optional(
                field,
                &value,
                "minutes",
                minutes,
            )?),
            "actual_time" => {
                TaskChange::ActualTime(optional(field, &value, "minutes", minutes)?)
            }
            "parent_id" => TaskChange::ParentId(optional(field, &value, "id", FieldValue::as_id)?),
            "position" => TaskChange::Position(
                value
                    .as_int()
                    .and_then(|position| i32::try_from(position).ok())
                    .ok_or_else(|| DomainError::invalid_value(field, "integer"))?,
            ),
            _ => {
                return Err(DomainError::UnknownField {
                    entity: Self::KIND,
                    field: field.to_string(),
                })
            }
        };
        Ok(change)
    }
}

/// Patchable task fields.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskChange {
    Title(String),
    Description(String),
    Status(TaskStatus),
    Priority(Priority),
    Project(String),
    Tags(Vec<String>),
    DueDate(Option<NaiveDate>),
    CompletedAt(Option<DateTime<Utc>>),
    EstimatedTime(Option<u32>),
    ActualTime(Option<u32>),
    ParentId(Option<Uuid>),
    Position(i32),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Archived,
}

impl TaskStatus {
    pub fn symbol(self) -> &'static str {
        match self {
            TaskStatus::Todo => "○",
            TaskStatus::InProgress => "◐",
            TaskStatus::Done => "●",
            TaskStatus::Archived => "◌",
        }
    }
}

impl Ranked for TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Done => 2,
            TaskStatus::Archived => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Archived => "archived",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Maps keyboard digits 1-5 onto priorities; 4 and 5 are both urgent.
    pub fn from_number(number: u8) -> Self {
        match number {
            1 => Priority::Low,
            3 => Priority::High,
            4 | 5 => Priority::Urgent,
            _ => Priority::Medium,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Priority::Low => "↓",
            Priority::Medium => "−",
            Priority::High => "↑",
            Priority::Urgent => "‼",
        }
    }
}

impl Ranked for Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn text(field: &str, value: &FieldValue) -> Result<String, DomainError> {
    match value {
        FieldValue::Text(text) => Ok(text.clone()),
        _ => Err(DomainError::invalid_value(field, "text")),
    }
}

pub(crate) fn ranked<R: Ranked>(field: &str, value: &FieldValue) -> Result<R, DomainError> {
    value
        .as_text()
        .and_then(R::parse)
        .ok_or_else(|| DomainError::invalid_value(field, "known variant"))
}

pub(crate) fn optional<V>(
    field: &str,
    value: &FieldValue,
    expected: &'static str,
    extract: impl Fn(&FieldValue) -> Option<V>,
) -> Result<Option<V>, DomainError> {
    if value.is_null() {
        return Ok(None);
    }
    extract(value)
        .map(Some)
        .ok_or_else(|| DomainError::invalid_value(field, expected))
}

fn minutes(value: &FieldValue) -> Option<u32> {
    value.as_int().and_then(|minutes| u32::try_from(minutes).ok())
}

//! Domain types representing projects that group tasks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::*,
    task::{optional, ranked, text},
    DomainError, FieldValue,
};

pub const PROJECT_NAME_MIN: usize = 3;
pub const PROJECT_NAME_MAX: usize = 50;
const DEFAULT_ICON: &str = "📁";

/// Named bucket for tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: ProjectColor,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_icon() -> String {
    DEFAULT_ICON.into()
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            color: ProjectColor::default(),
            icon: default_icon(),
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_color(mut self, color: ProjectColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Projects seeded into an empty project store.
pub fn default_projects() -> Vec<Project> {
    vec![
        Project::new("Inbox")
            .with_color(ProjectColor::Cyan)
            .with_icon("📥")
            .with_description("Default project for new tasks"),
        Project::new("Personal")
            .with_color(ProjectColor::Green)
            .with_icon("🏠")
            .with_description("Personal tasks and goals"),
        Project::new("Work")
            .with_color(ProjectColor::Blue)
            .with_icon("💼")
            .with_description("Work-related tasks"),
    ]
}

impl Identifiable for Project {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Project {
    type Change = ProjectChange;

    const KIND: &'static str = "project";
    const COLLECTION: &'static str = "projects";

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), DomainError> {
        let length = self.name.trim().chars().count();
        if length < PROJECT_NAME_MIN {
            return Err(DomainError::validation(format!(
                "Project name must be at least {PROJECT_NAME_MIN} characters"
            )));
        }
        if self.name.chars().count() > PROJECT_NAME_MAX {
            return Err(DomainError::validation(format!(
                "Project name cannot exceed {PROJECT_NAME_MAX} characters"
            )));
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let value: FieldValue = match name {
            "id" => self.id.into(),
            "name" => self.name.as_str().into(),
            "description" => self.description.as_str().into(),
            "color" => self.color.to_field(),
            "icon" => self.icon.as_str().into(),
            "is_archived" => self.is_archived.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, change: &ProjectChange) {
        match change {
            ProjectChange::Name(name) => self.name = name.clone(),
            ProjectChange::Description(description) => self.description = description.clone(),
            ProjectChange::Color(color) => self.color = *color,
            ProjectChange::Icon(icon) => self.icon = icon.clone(),
            ProjectChange::Archived(archived) => self.is_archived = *archived,
        }
    }

    fn parse_change(field: &str, value: FieldValue) -> Result<ProjectChange, DomainError> {
        let change = match field {
            "name" => ProjectChange::Name(text(field, &value)?),
            "description" => ProjectChange::Description(text(field, &value)?),
            "color" => ProjectChange::Color(ranked(field, &value)?),
            "icon" => ProjectChange::Icon(text(field, &value)?),
            "is_archived" => ProjectChange::Archived(
                optional(field, &value, "bool", FieldValue::as_bool)?
                    .ok_or_else(|| DomainError::invalid_value(field, "bool"))?,
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

/// Patchable project fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectChange {
    Name(String),
    Description(String),
    Color(ProjectColor),
    Icon(String),
    Archived(bool),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectColor {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    #[default]
    Cyan,
    White,
}

impl Ranked for ProjectColor {
    fn rank(self) -> u8 {
        match self {
            ProjectColor::Red => 0,
            ProjectColor::Green => 1,
            ProjectColor::Yellow => 2,
            ProjectColor::Blue => 3,
            ProjectColor::Magenta => 4,
            ProjectColor::Cyan => 5,
            ProjectColor::White => 6,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ProjectColor::Red => "red",
            ProjectColor::Green => "green",
            ProjectColor::Yellow => "yellow",
            ProjectColor::Blue => "blue",
            ProjectColor::Magenta => "magenta",
            ProjectColor::Cyan => "cyan",
            ProjectColor::White => "white",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" => Some(ProjectColor::Red),
            "green" => Some(ProjectColor::Green),
            "yellow" => Some(ProjectColor::Yellow),
            "blue" => Some(ProjectColor::Blue),
            "magenta" => Some(ProjectColor::Magenta),
            "cyan" => Some(ProjectColor::Cyan),
            "white" => Some(ProjectColor::White),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let projects = default_projects();
        assert_eq!(projects.len(), 3);
        assert!(projects.iter().all(|project| project.validate().is_ok()));
        assert_eq!(projects[0].name, "Inbox");
    }

    #[test]
    fn name_length_is_bounded() {
        assert!(Project::new("ab").validate().is_err());
        assert!(Project::new("abc").validate().is_ok());
        assert!(Project::new("a".repeat(PROJECT_NAME_MAX + 1)).validate().is_err());
    }

    #[test]
    fn archived_change_requires_a_bool() {
        assert_eq!(
            Project::parse_change("is_archived", FieldValue::Bool(true)).expect("bool"),
            ProjectChange::Archived(true)
        );
        assert!(Project::parse_change("is_archived", FieldValue::Null).is_err());
        assert!(Project::parse_change("owner", FieldValue::from("me")).is_err());
    }

    #[test]
    fn color_serializes_lowercase() {
        let project = Project::new("Garden").with_color(ProjectColor::Magenta);
        let record = serde_json::to_value(&project).expect("serialize project");
        assert_eq!(record["color"], "magenta");
        assert_eq!(record["is_archived"], false);
    }
}

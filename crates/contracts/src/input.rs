//! Validated write payloads.
//!
//! Raw request bodies are decoded against a closed field list (unknown keys are
//! rejected), text is passed through [`strip_markup`], and flags through
//! [`coerce_flag`]. A JSON `null` is treated the same as an absent key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::{coerce_flag, strip_markup};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    field: Option<String>,
    message: String,
}

impl ValidationError {
    pub fn for_field(field: &str, reason: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            message: format!("{} {}", field, reason),
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoryFields {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EpisodeFields {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    featured: Option<Value>,
    #[serde(default)]
    categoryid: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
}

impl NewCategory {
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let fields: CategoryFields = decode(body)?;
        Ok(Self {
            name: required("name", text("name", fields.name)?)?,
            description: required("description", text("description", fields.description)?)?,
        })
    }
}

/// Partial category update. Absent fields are left out of the backend `_set` input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategoryPatch {
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let fields: CategoryFields = decode(body)?;
        let patch = Self {
            name: text("name", fields.name)?,
            description: text("description", fields.description)?,
        };
        if patch.is_empty() {
            return Err(empty_update());
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEpisode {
    pub name: String,
    pub description: String,
    pub featured: bool,
    pub categoryid: String,
}

impl NewEpisode {
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let fields: EpisodeFields = decode(body)?;
        Ok(Self {
            name: required("name", text("name", fields.name)?)?,
            description: required("description", text("description", fields.description)?)?,
            featured: flag(fields.featured).unwrap_or(false),
            categoryid: required("categoryid", reference("categoryid", fields.categoryid)?)?,
        })
    }
}

/// Partial episode update. `featured: None` means "unchanged", not `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpisodePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoryid: Option<String>,
}

impl EpisodePatch {
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let fields: EpisodeFields = decode(body)?;
        let patch = Self {
            name: text("name", fields.name)?,
            description: text("description", fields.description)?,
            featured: flag(fields.featured),
            categoryid: reference("categoryid", fields.categoryid)?,
        };
        if patch.is_empty() {
            return Err(empty_update());
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.featured.is_none()
            && self.categoryid.is_none()
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ValidationError> {
    if !body.is_object() {
        return Err(ValidationError::payload("request body must be a JSON object"));
    }

    serde_json::from_value(body).map_err(|err| ValidationError::payload(err.to_string()))
}

fn empty_update() -> ValidationError {
    ValidationError::payload("update must set at least one field")
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::for_field(field, "is required"))
}

fn text(field: &str, value: Option<Value>) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(Value::String(raw)) => {
            let clean = strip_markup(&raw);
            if clean.is_empty() {
                return Err(ValidationError::for_field(
                    field,
                    "must be a non-empty string after sanitization",
                ));
            }
            Ok(Some(clean))
        }
        Some(_) => Err(ValidationError::for_field(field, "must be a string")),
    }
}

// Ids are opaque to this layer: trimmed, never rewritten.
fn reference(field: &str, value: Option<Value>) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(Value::String(raw)) => {
            let id = raw.trim();
            if id.is_empty() {
                return Err(ValidationError::for_field(field, "must not be empty"));
            }
            Ok(Some(id.to_string()))
        }
        Some(_) => Err(ValidationError::for_field(field, "must be a string")),
    }
}

fn flag(value: Option<Value>) -> Option<bool> {
    value.as_ref().map(coerce_flag)
}

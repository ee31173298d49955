//! In-memory record model exchanged with the persistence layer.
//!
//! A [`Record`] is the field set of one entity instance as the persistence
//! layer sees it during a mutation. Attachment fields arrive as
//! [`FieldValue::Upload`] and leave as three plain columns per field:
//! `<field>_file_name`, `<field>_file_size` and `<field>_content_type`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::RecordId;
use crate::upload::UploadPayload;

/// Column suffixes stored for every attachment field.
pub const FILE_COLUMN_SUFFIXES: &[&str] = &["file_name", "file_size", "content_type"];

/// Build the name of a stored attachment column, e.g. `avatar_file_name`.
///
/// # Examples
///
/// ```
/// use attachforge_common::file_column;
///
/// assert_eq!(file_column("avatar", "file_name"), "avatar_file_name");
/// ```
pub fn file_column(field: &str, suffix: &str) -> String {
    format!("{}_{}", field, suffix)
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    /// A new file waiting to be staged. Never persisted as-is.
    Upload(UploadPayload),
}

impl FieldValue {
    /// Whether the value counts as empty (null, empty text, or an upload without a source).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::Integer(_) => false,
            Self::Upload(payload) => payload.temp_path.as_os_str().is_empty(),
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Upload view of the value, if it is an upload.
    pub fn as_upload(&self) -> Option<&UploadPayload> {
        match self {
            Self::Upload(p) => Some(p),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<UploadPayload> for FieldValue {
    fn from(p: UploadPayload) -> Self {
        Self::Upload(p)
    }
}

/// One entity instance as seen by the lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Entity type name, e.g. `User` or `BlogPost`.
    pub entity: String,
    /// Primary key; `None` until the persistence layer has created the record.
    pub id: Option<RecordId>,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty, not yet persisted record.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set the primary key.
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Set a text field.
    pub fn set_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), FieldValue::Text(value.into()));
    }

    /// Attach an upload to a field.
    pub fn set_upload(&mut self, name: impl Into<String>, payload: UploadPayload) {
        self.fields.insert(name.into(), FieldValue::Upload(payload));
    }

    /// Get a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Get a text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }

    /// Get the upload attached to a field.
    pub fn upload(&self, name: &str) -> Option<&UploadPayload> {
        self.fields.get(name).and_then(FieldValue::as_upload)
    }

    /// Whether the field is present in memory (even if null).
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Remove a field and return its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Stored base filename of an attachment field, if present and non-empty.
    pub fn file_name(&self, field: &str) -> Option<&str> {
        self.text(&file_column(field, "file_name"))
            .filter(|name| !name.is_empty())
    }

    /// Iterate over all fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields the persistence layer should store: everything except pending uploads.
    pub fn persisted_fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields()
            .filter(|(_, v)| !matches!(v, FieldValue::Upload(_)))
    }
}

//! Immutable attachment configuration.
//!
//! An [`AttachmentRegistry`] is built once at startup, from a config file or by
//! hand through [`AttachmentRegistry::builder`], and then shared read-only
//! (usually behind an `Arc`) by every staging operation.

use std::collections::BTreeMap;

use attachforge_common::{Error, Result};
use attachforge_geometry::{Geometry, SingleAxis};
use serde::{Deserialize, Serialize};

/// Style name of the uploaded file itself.
pub const ORIGINAL_STYLE: &str = "original";

pub const DEFAULT_PATH: &str = ":webroot/upload/:model/:id/:style-:basename.:extension";
pub const DEFAULT_URL: &str = "/upload/:model/:id/:style-:basename.:extension";
pub const DEFAULT_QUALITY: u8 = 95;

/// What to do when an upload cannot be moved into place at commit time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveFailurePolicy {
    /// Return [`Error::Move`] (or [`Error::AlreadyExists`]) to the caller.
    #[default]
    Strict,
    /// Log the failure, record it in the commit report and carry on.
    Lenient,
}

/// Settings of one attachment field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub path: String,
    pub url: String,
    pub default_url: Option<String>,
    pub styles: BTreeMap<String, Geometry>,
    pub resize_to_max_width: bool,
    /// 1-100, applied to JPEG and GIF derivatives.
    pub quality: u8,
    pub overwrite: bool,
    /// Field that may carry a source URL instead of an upload.
    pub url_field: Option<String>,
}

impl Default for AttachmentSpec {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            url: DEFAULT_URL.to_string(),
            default_url: None,
            styles: BTreeMap::new(),
            resize_to_max_width: false,
            quality: DEFAULT_QUALITY,
            overwrite: false,
            url_field: None,
        }
    }
}

impl AttachmentSpec {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_default_url(mut self, default_url: impl Into<String>) -> Self {
        self.default_url = Some(default_url.into());
        self
    }

    pub fn with_style(mut self, name: impl Into<String>, geometry: Geometry) -> Self {
        self.styles.insert(name.into(), geometry);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_resize_to_max_width(mut self, enabled: bool) -> Self {
        self.resize_to_max_width = enabled;
        self
    }

    pub fn with_url_field(mut self, field: impl Into<String>) -> Self {
        self.url_field = Some(field.into());
        self
    }

    /// Style names including `original`, in deletion order.
    pub fn style_names(&self) -> impl Iterator<Item = &str> {
        self.styles
            .keys()
            .map(String::as_str)
            .chain(std::iter::once(ORIGINAL_STYLE))
    }

    fn validate(&self, entity: &str, field: &str) -> Result<()> {
        let at = || format!("{}.{}", entity, field);
        if !(1..=100).contains(&self.quality) {
            return Err(Error::invalid_config(format!(
                "{}: quality must be between 1 and 100, got {}",
                at(),
                self.quality
            )));
        }
        if self.path.trim().is_empty() {
            return Err(Error::invalid_config(format!("{}: path template is empty", at())));
        }
        if self.url.trim().is_empty() {
            return Err(Error::invalid_config(format!("{}: url template is empty", at())));
        }
        if self.styles.contains_key(ORIGINAL_STYLE) {
            return Err(Error::invalid_config(format!(
                "{}: style name '{}' is reserved",
                at(),
                ORIGINAL_STYLE
            )));
        }
        if self.url_field.as_deref() == Some(field) {
            return Err(Error::invalid_config(format!(
                "{}: url_field cannot be the attachment field itself",
                at()
            )));
        }
        Ok(())
    }
}

/// Process-wide attachment settings, keyed by entity type and field.
#[derive(Debug, Clone)]
pub struct AttachmentRegistry {
    app_root: String,
    web_root: String,
    salt: String,
    move_failure: MoveFailurePolicy,
    single_axis: SingleAxis,
    entities: BTreeMap<String, BTreeMap<String, AttachmentSpec>>,
}

impl AttachmentRegistry {
    pub fn builder() -> AttachmentRegistryBuilder {
        AttachmentRegistryBuilder::default()
    }

    /// Settings of `entity`.`field`, if registered.
    pub fn spec(&self, entity: &str, field: &str) -> Option<&AttachmentSpec> {
        self.entities.get(entity).and_then(|fields| fields.get(field))
    }

    /// Like [`spec`](Self::spec) but an unregistered field is an error.
    pub fn require(&self, entity: &str, field: &str) -> Result<&AttachmentSpec> {
        self.spec(entity, field)
            .ok_or_else(|| Error::not_found(format!("attachment {}.{}", entity, field)))
    }

    /// Attachment fields of an entity, sorted by name.
    pub fn fields(&self, entity: &str) -> Vec<&str> {
        self.entities
            .get(entity)
            .map(|fields| fields.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Attachment fields of an entity with their settings, sorted by name.
    pub fn specs(&self, entity: &str) -> impl Iterator<Item = (&str, &AttachmentSpec)> {
        self.entities
            .get(entity)
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Registered entity types, sorted.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Whether any attachment is registered for `entity`.
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn app_root(&self) -> &str {
        &self.app_root
    }

    pub fn web_root(&self) -> &str {
        &self.web_root
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn move_failure(&self) -> MoveFailurePolicy {
        self.move_failure
    }

    pub fn single_axis(&self) -> SingleAxis {
        self.single_axis
    }
}

/// Collects settings and validates them in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct AttachmentRegistryBuilder {
    app_root: String,
    web_root: String,
    salt: String,
    move_failure: MoveFailurePolicy,
    single_axis: SingleAxis,
    entities: BTreeMap<String, BTreeMap<String, AttachmentSpec>>,
    duplicates: Vec<String>,
}

impl AttachmentRegistryBuilder {
    /// Value of `:app`. A trailing `/` is dropped.
    pub fn app_root(mut self, root: impl Into<String>) -> Self {
        self.app_root = root.into();
        self
    }

    /// Value of `:webroot`. A trailing `/` is dropped.
    pub fn web_root(mut self, root: impl Into<String>) -> Self {
        self.web_root = root.into();
        self
    }

    /// Secret mixed into `:hash`.
    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    pub fn move_failure(mut self, policy: MoveFailurePolicy) -> Self {
        self.move_failure = policy;
        self
    }

    pub fn single_axis(mut self, axis: SingleAxis) -> Self {
        self.single_axis = axis;
        self
    }

    pub fn register(
        mut self,
        entity: impl Into<String>,
        field: impl Into<String>,
        spec: AttachmentSpec,
    ) -> Self {
        let entity = entity.into();
        let field = field.into();
        let fields = self.entities.entry(entity.clone()).or_default();
        if fields.insert(field.clone(), spec).is_some() {
            self.duplicates.push(format!("{}.{}", entity, field));
        }
        self
    }

    pub fn build(self) -> Result<AttachmentRegistry> {
        if let Some(dup) = self.duplicates.first() {
            return Err(Error::invalid_config(format!(
                "attachment {} registered twice",
                dup
            )));
        }
        for (entity, fields) in &self.entities {
            for (field, spec) in fields {
                spec.validate(entity, field)?;
            }
        }

        Ok(AttachmentRegistry {
            app_root: self.app_root.trim_end_matches('/').to_string(),
            web_root: self.web_root.trim_end_matches('/').to_string(),
            salt: self.salt,
            move_failure: self.move_failure,
            single_axis: self.single_axis,
            entities: self.entities,
        })
    }
}

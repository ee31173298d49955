//! Path and URL template interpolation.
//!
//! Templates contain `:name` placeholders:
//!
//! | Placeholder   | Value                                                 |
//! |---------------|-------------------------------------------------------|
//! | `:app`        | application root, without trailing `/`                |
//! | `:webroot`    | web root, without trailing `/`                        |
//! | `:model`      | entity type, tableized (`BlogPost` -> `blog_posts`)   |
//! | `:basename`   | file name without extension                           |
//! | `:extension`  | file extension                                        |
//! | `:id`         | record primary key, empty for unsaved records         |
//! | `:style`      | style name, `original` for the upload itself          |
//! | `:attachment` | field name, pluralized                                |
//! | `:hash`       | SHA-256 of basename plus salt, hex                    |
//!
//! A placeholder only matches when the next character is not an ASCII letter
//! or digit, so `:id` leaves `:identity` alone. Unknown placeholders are kept
//! as written. After substitution every run of `/` collapses to one.

use std::collections::BTreeMap;
use std::path::PathBuf;

use attachforge_common::inflect::{pluralize, tableize};
use attachforge_common::paths::split_file_name;
use attachforge_common::{RecordId, Result};
use attachforge_geometry::Geometry;
use sha2::{Digest, Sha256};

use crate::registry::{AttachmentRegistry, AttachmentSpec};

/// Placeholder values for one (record, field, file, style) combination.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    /// Build every placeholder value from its inputs.
    pub fn new(
        registry: &AttachmentRegistry,
        entity: &str,
        id: Option<&RecordId>,
        field: &str,
        file_name: &str,
        style: &str,
    ) -> Self {
        let (basename, extension) = split_file_name(file_name);

        let mut values = BTreeMap::new();
        values.insert("app", registry.app_root().to_string());
        values.insert("webroot", registry.web_root().to_string());
        values.insert("model", tableize(entity));
        values.insert("basename", basename.to_string());
        values.insert("extension", extension.to_string());
        values.insert("id", id.map(|id| id.to_string()).unwrap_or_default());
        values.insert("style", style.to_string());
        values.insert("attachment", pluralize(field));
        values.insert("hash", content_hash(basename, registry.salt()));

        Self { values }
    }

    /// Override or add a single value.
    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.values.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Substitute placeholders in `template` and collapse repeated slashes.
    pub fn apply(&self, template: &str) -> String {
        collapse_slashes(&self.substitute(template))
    }

    fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + 32);
        let mut rest = template;

        while let Some(pos) = rest.find(':') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let len = after
                .bytes()
                .take_while(u8::is_ascii_alphanumeric)
                .count();
            let name = &after[..len];

            match self.values.get(name) {
                Some(value) if len > 0 => out.push_str(value),
                _ => {
                    out.push(':');
                    out.push_str(name);
                }
            }
            rest = &after[len..];
        }

        out.push_str(rest);
        out
    }
}

/// Cache-busting digest of a file's basename. Not a security primitive.
pub fn content_hash(basename: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(basename.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Collapse every run of two or more `/` into a single `/`.
pub fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Concrete location of one style of one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub path: PathBuf,
    pub url: String,
    pub default_url: Option<String>,
    pub style: String,
    pub quality: u8,
    pub overwrite: bool,
    pub styles: BTreeMap<String, Geometry>,
}

impl ResolvedLocation {
    fn from_spec(spec: &AttachmentSpec, placeholders: &Placeholders, style: &str) -> Self {
        Self {
            path: PathBuf::from(placeholders.apply(&spec.path)),
            url: placeholders.apply(&spec.url),
            default_url: spec.default_url.as_deref().map(|t| placeholders.apply(t)),
            style: style.to_string(),
            quality: spec.quality,
            overwrite: spec.overwrite,
            styles: spec.styles.clone(),
        }
    }
}

/// Resolve the path, URL and default URL of `entity`.`field` for a file name
/// and style.
///
/// Fails with [`NotFound`](attachforge_common::Error::NotFound) when the field
/// is not registered.
pub fn resolve(
    registry: &AttachmentRegistry,
    entity: &str,
    id: Option<&RecordId>,
    field: &str,
    file_name: &str,
    style: &str,
) -> Result<ResolvedLocation> {
    let spec = registry.require(entity, field)?;
    let placeholders = Placeholders::new(registry, entity, id, field, file_name, style);
    Ok(ResolvedLocation::from_spec(spec, &placeholders, style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AttachmentSpec, ORIGINAL_STYLE};

    fn registry(spec: AttachmentSpec) -> AttachmentRegistry {
        AttachmentRegistry::builder()
            .app_root("/srv/app/")
            .web_root("/srv/app/webroot/")
            .salt("pepper")
            .register("BlogPost", "photo", spec)
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_templates() {
        let registry = registry(AttachmentSpec::default());
        let id = RecordId::from(42);
        let loc = resolve(&registry, "BlogPost", Some(&id), "photo", "pic.jpg", "thumb").unwrap();

        assert_eq!(
            loc.path,
            PathBuf::from("/srv/app/webroot/upload/blog_posts/42/thumb-pic.jpg")
        );
        assert_eq!(loc.url, "/upload/blog_posts/42/thumb-pic.jpg");
        assert_eq!(loc.default_url, None);
        assert_eq!(loc.style, "thumb");
        assert_eq!(loc.quality, 95);
    }

    #[test]
    fn test_missing_id_collapses_slashes() {
        let registry = registry(AttachmentSpec::default());
        let loc = resolve(&registry, "BlogPost", None, "photo", "pic.jpg", ORIGINAL_STYLE).unwrap();

        assert_eq!(
            loc.path,
            PathBuf::from("/srv/app/webroot/upload/blog_posts/original-pic.jpg")
        );
        assert!(!loc.url.contains("//"));
    }

    #[test]
    fn test_all_placeholders() {
        let spec = AttachmentSpec::default()
            .with_path(":app/files/:attachment/:model/:id/:style/:basename.:extension")
            .with_url("/f/:hash/:basename.:extension")
            .with_default_url("/img/missing-:style.png");
        let registry = registry(spec);
        let id = RecordId::from(7);
        let loc = resolve(&registry, "BlogPost", Some(&id), "photo", "my.pic.png", "big").unwrap();

        assert_eq!(
            loc.path,
            PathBuf::from("/srv/app/files/photos/blog_posts/7/big/my.pic.png")
        );
        assert_eq!(
            loc.url,
            format!("/f/{}/my.pic.png", content_hash("my.pic", "pepper"))
        );
        assert_eq!(loc.default_url.as_deref(), Some("/img/missing-big.png"));
    }

    #[test]
    fn test_token_bounded() {
        let registry = registry(AttachmentSpec::default());
        let id = RecordId::from(5);
        let p = Placeholders::new(&registry, "BlogPost", Some(&id), "photo", "a.jpg", "thumb");

        assert_eq!(p.apply(":identity/:id"), ":identity/5");
        assert_eq!(p.apply(":id_:style"), "5_thumb");
        assert_eq!(p.apply(":ids"), ":ids");
        assert_eq!(p.apply("a::b"), "a::b");
        assert_eq!(p.apply("trailing:"), "trailing:");
        assert_eq!(p.apply(":unknown-:basename"), ":unknown-a");
    }

    #[test]
    fn test_values_are_not_reinterpolated() {
        let registry = registry(AttachmentSpec::default());
        let p = Placeholders::new(&registry, "BlogPost", None, "photo", ":style.jpg", "thumb");
        assert_eq!(p.apply(":basename-:style"), ":style-thumb");
    }

    #[test]
    fn test_deterministic() {
        let registry = registry(AttachmentSpec::default());
        let id = RecordId::from(1);
        let a = resolve(&registry, "BlogPost", Some(&id), "photo", "x.gif", "s").unwrap();
        let b = resolve(&registry, "BlogPost", Some(&id), "photo", "x.gif", "s").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_collapse_slashes() {
        assert_eq!(collapse_slashes("a//b///c/"), "a/b/c/");
        assert_eq!(collapse_slashes("http://host//x"), "http:/host/x");
        assert_eq!(collapse_slashes(""), "");
    }

    #[test]
    fn test_unregistered_field() {
        let registry = registry(AttachmentSpec::default());
        assert!(resolve(&registry, "BlogPost", None, "cover", "a.jpg", "x").is_err());
    }

    #[test]
    fn test_file_without_extension() {
        let registry = registry(AttachmentSpec::default());
        let p = Placeholders::new(&registry, "BlogPost", None, "photo", "README", "original");
        assert_eq!(p.get("basename"), Some("README"));
        assert_eq!(p.get("extension"), Some(""));
    }
}

mod types;

pub use types::*;

use anyhow::{Context, Result};
use attachforge_geometry::{Geometry, SingleAxis};
use std::path::Path;

use crate::registry::{AttachmentRegistry, AttachmentSpec};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./attachforge.toml",
        "~/.config/attachforge/config.toml",
        "/etc/attachforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

impl Config {
    /// Build the immutable registry the staging layer works from.
    pub fn to_registry(&self) -> Result<AttachmentRegistry> {
        let axis = if self.storage.exact_single_axis {
            SingleAxis::Exact
        } else {
            SingleAxis::Legacy
        };

        let mut builder = AttachmentRegistry::builder()
            .app_root(shellexpand::tilde(&self.storage.app_root))
            .web_root(shellexpand::tilde(&self.storage.web_root))
            .salt(self.storage.salt.clone())
            .move_failure(self.storage.move_failure)
            .single_axis(axis);

        for (entity, fields) in &self.entities {
            for (field, attachment) in fields {
                let spec = attachment
                    .to_spec()
                    .with_context(|| format!("Invalid attachment {}.{}", entity, field))?;
                builder = builder.register(entity.clone(), field.clone(), spec);
            }
        }

        Ok(builder.build()?)
    }
}

impl AttachmentConfig {
    fn to_spec(&self) -> Result<AttachmentSpec> {
        let mut spec = AttachmentSpec {
            path: self.path.clone(),
            url: self.url.clone(),
            default_url: self.default_url.clone(),
            resize_to_max_width: self.resize_to_max_width,
            quality: self.quality,
            overwrite: self.overwrite,
            url_field: self.url_field.clone(),
            ..AttachmentSpec::default()
        };
        for (style, geometry) in &self.styles {
            let geometry: Geometry = geometry
                .parse()
                .with_context(|| format!("Style '{}' has an invalid geometry", style))?;
            spec.styles.insert(style.clone(), geometry);
        }
        Ok(spec)
    }
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    config.to_registry()?;

    let web_root = shellexpand::tilde(&config.storage.web_root);
    if !Path::new(web_root.as_ref()).exists() {
        tracing::warn!("Web root does not exist: {}", web_root);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attachforge_common::Error;
    use crate::registry::MoveFailurePolicy;

    const SAMPLE: &str = r#"
[storage]
app_root = "/srv/app"
web_root = "/srv/app/public/"
salt = "secret"
move_failure = "lenient"
exact_single_axis = true

[entities.User.avatar]
path = ":webroot/upload/:model/:id/:style-:basename.:extension"
styles = { thumb = "100x100", banner = "[300x100]" }
url_field = "avatar_url"

[entities.Post.cover]
quality = 70
overwrite = true
"#;

    #[test]
    fn test_parse_and_build_registry() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.storage.move_failure, MoveFailurePolicy::Lenient);
        assert_eq!(config.database.path, std::path::PathBuf::from("attachforge.db"));

        let registry = config.to_registry().unwrap();
        assert_eq!(registry.web_root(), "/srv/app/public");
        assert_eq!(registry.single_axis(), SingleAxis::Exact);
        assert_eq!(registry.move_failure(), MoveFailurePolicy::Lenient);

        let avatar = registry.spec("User", "avatar").unwrap();
        assert_eq!(avatar.styles.len(), 2);
        assert_eq!(avatar.styles["banner"], Geometry::Band { width: 300, height: 100 });
        assert_eq!(avatar.quality, 95);
        assert_eq!(avatar.url_field.as_deref(), Some("avatar_url"));

        let cover = registry.spec("Post", "cover").unwrap();
        assert_eq!(cover.quality, 70);
        assert!(cover.overwrite);
        assert_eq!(cover.path, crate::registry::DEFAULT_PATH);
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let config: Config = toml::from_str(
            r#"
[entities.User.avatar]
styles = { thumb = "100xx" }
"#,
        )
        .unwrap();
        let err = config.to_registry().unwrap_err();
        assert!(format!("{:#}", err).contains("thumb"));
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let config: Config = toml::from_str(
            r#"
[entities.User.avatar]
quality = 101
"#,
        )
        .unwrap();
        let err = config.to_registry().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attachforge.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.entities.len(), 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.to_registry().is_ok());
        assert!(config.entities.is_empty());
    }
}

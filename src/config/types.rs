use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::registry::{MoveFailurePolicy, DEFAULT_PATH, DEFAULT_QUALITY, DEFAULT_URL};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Entity type name to field name to attachment settings.
    #[serde(default)]
    pub entities: BTreeMap<String, BTreeMap<String, AttachmentConfig>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Value of `:app`
    #[serde(default = "default_app_root")]
    pub app_root: String,

    /// Value of `:webroot`
    #[serde(default = "default_web_root")]
    pub web_root: String,

    /// Secret mixed into `:hash`
    #[serde(default)]
    pub salt: String,

    #[serde(default)]
    pub move_failure: MoveFailurePolicy,

    /// Constrain `Nw`/`Nh`/`Nl` to exactly N pixels instead of N-1
    #[serde(default)]
    pub exact_single_axis: bool,
}

fn default_app_root() -> String {
    ".".to_string()
}

fn default_web_root() -> String {
    "./webroot".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            web_root: default_web_root(),
            salt: String::new(),
            move_failure: MoveFailurePolicy::default(),
            exact_single_axis: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file used by `attach` and `detach`
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("attachforge.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AttachmentConfig {
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub default_url: Option<String>,

    /// Style name to geometry string
    #[serde(default)]
    pub styles: BTreeMap<String, String>,

    #[serde(default)]
    pub resize_to_max_width: bool,

    #[serde(default = "default_quality")]
    pub quality: u8,

    #[serde(default)]
    pub overwrite: bool,

    #[serde(default)]
    pub url_field: Option<String>,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            url: default_url(),
            default_url: None,
            styles: BTreeMap::new(),
            resize_to_max_width: false,
            quality: default_quality(),
            overwrite: false,
            url_field: None,
        }
    }
}

//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a scratch web root, an attachment
//! registry pointing into it, and a [`Repository`] backed by the in-memory
//! SQLite record store.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use attachforge::lifecycle::RemoteFetcher;
use attachforge::registry::{AttachmentRegistry, AttachmentSpec};
use attachforge::repository::Repository;
use attachforge::validation::Rule;
use attachforge_common::UploadPayload;
use attachforge_db::{init_memory_pool, SqliteRecordStore};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

/// Path template used by the harness: everything for one record in one folder.
pub const PATH: &str = ":webroot/:model/:id/:style-:basename.:extension";

pub struct TestHarness {
    pub root: TempDir,
    pub uploads: TempDir,
    pub store: Arc<SqliteRecordStore>,
    pub repo: Repository<SqliteRecordStore>,
}

impl TestHarness {
    /// `User.avatar` with a cover thumb and a band banner, overwrite disabled.
    pub fn new() -> Self {
        Self::with_spec(
            AttachmentSpec::default()
                .with_path(PATH)
                .with_style("thumb", "100x100".parse().unwrap())
                .with_style("banner", "[300x100]".parse().unwrap()),
        )
    }

    pub fn with_spec(spec: AttachmentSpec) -> Self {
        let root = tempfile::tempdir().expect("failed to create web root");
        let registry = AttachmentRegistry::builder()
            .web_root(root.path().to_string_lossy())
            .register("User", "avatar", spec)
            .build()
            .expect("invalid test registry");
        Self::with_registry(root, registry)
    }

    pub fn with_registry(root: TempDir, registry: AttachmentRegistry) -> Self {
        let uploads = tempfile::tempdir().expect("failed to create upload dir");
        let pool = init_memory_pool().expect("failed to create in-memory pool");
        let store = Arc::new(SqliteRecordStore::new(pool));
        let repo = Repository::new(Arc::new(registry), Arc::clone(&store));
        Self {
            root,
            uploads,
            store,
            repo,
        }
    }

    /// Add a validation rule to the repository.
    pub fn with_rule(self, field: &str, rule: Rule) -> Self {
        Self {
            repo: self.repo.with_rule(field, rule),
            ..self
        }
    }

    pub fn with_fetcher(self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            repo: self.repo.with_fetcher(fetcher),
            ..self
        }
    }

    /// Folder holding the files of `User` `id`.
    pub fn user_dir(&self, id: &str) -> PathBuf {
        self.root.path().join("users").join(id)
    }

    /// Write a JPEG of the given size as a fresh upload.
    pub fn jpeg_upload(&self, name: &str, width: u32, height: u32) -> UploadPayload {
        image_upload(self.uploads.path(), name, width, height, ImageFormat::Jpeg, "image/jpeg")
    }

    pub fn png_upload(&self, name: &str, width: u32, height: u32) -> UploadPayload {
        image_upload(self.uploads.path(), name, width, height, ImageFormat::Png, "image/png")
    }
}

pub fn image_upload(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    format: ImageFormat,
    content_type: &str,
) -> UploadPayload {
    let path = dir.join(format!("upload-{}", uuid::Uuid::new_v4().simple()));
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])))
        .save_with_format(&path, format)
        .expect("failed to write test image");
    let mut payload = UploadPayload::from_path(&path, content_type).expect("failed to stat upload");
    payload.name = name.to_string();
    payload
}

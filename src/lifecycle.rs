//! Lifecycle hooks invoked by the persistence layer.
//!
//! The persistence layer calls these in a fixed order:
//!
//! - save: `before_validate`, validation, `before_save`, store, `after_save`
//! - delete: `before_delete`, store delete, `after_delete`
//!
//! [`Repository`](crate::repository::Repository) drives that order for any
//! [`RecordStore`](attachforge_common::RecordStore).

use std::collections::BTreeMap;
use std::sync::Arc;

use attachforge_common::{Error, FieldValue, Record, RecordLookup, Result, UploadPayload};
use tracing::{debug, info};

use crate::registry::AttachmentRegistry;
use crate::staging::{CommitReport, StagingManager};
use crate::validation::{self, Rule};

/// The five lifecycle phases of an attachment-owning record.
pub trait AttachmentLifecycle {
    /// Turn source URLs into uploads.
    fn before_validate(&mut self, record: &mut Record) -> Result<()>;

    /// Stage writes (and deletes of replaced files). On error the record is
    /// left unchanged and must not be persisted.
    fn before_save(&mut self, record: &mut Record) -> Result<()>;

    /// Commit staged deletes (updates only) and then staged writes.
    fn after_save(&mut self, record: &Record, created: bool) -> Result<CommitReport>;

    /// Stage deletes of every attachment of the record.
    fn before_delete(&mut self, record: &Record) -> Result<()>;

    /// Commit staged deletes.
    fn after_delete(&mut self, record: &Record) -> Result<CommitReport>;
}

/// Fetches a remote file into a temporary path.
///
/// The returned payload must have `remote` set; see
/// [`UploadPayload::from_remote_url`].
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<UploadPayload>;
}

/// Default [`AttachmentLifecycle`] implementation.
pub struct AttachmentHooks {
    registry: Arc<AttachmentRegistry>,
    lookup: Arc<dyn RecordLookup>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
    staging: StagingManager,
    downscales: BTreeMap<String, u32>,
}

impl AttachmentHooks {
    pub fn new(registry: Arc<AttachmentRegistry>, lookup: Arc<dyn RecordLookup>) -> Self {
        Self {
            staging: StagingManager::new(Arc::clone(&registry)),
            registry,
            lookup,
            fetcher: None,
            downscales: BTreeMap::new(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn registry(&self) -> &AttachmentRegistry {
        &self.registry
    }

    pub fn staging(&self) -> &StagingManager {
        &self.staging
    }

    /// Drop staged state without committing it.
    pub fn discard(&mut self) {
        self.staging.reset();
        self.downscales.clear();
    }

    /// Evaluate a validation rule for `field`.
    ///
    /// A failing `MaxWidth` on a field with `resize_to_max_width` passes
    /// instead, and the original is downscaled to that width at commit.
    pub fn validate(&mut self, record: &Record, field: &str, rule: &Rule) -> bool {
        let passed = validation::check(rule, record, field, self.lookup.as_ref());
        if let Rule::MaxWidth(max) = rule {
            let resize = self
                .registry
                .spec(&record.entity, field)
                .is_some_and(|spec| spec.resize_to_max_width);
            if !passed && resize {
                debug!(field, max, "Upload wider than allowed, will downscale");
                self.downscales.insert(field.to_string(), *max);
                return true;
            }
        }
        passed
    }

    fn source_url(&self, record: &Record, field: &str, value: &FieldValue) -> Option<String> {
        let spec = self.registry.spec(&record.entity, field)?;
        if value.is_empty() {
            let url_field = spec.url_field.as_deref()?;
            return record
                .text(url_field)
                .filter(|url| !url.is_empty())
                .map(String::from);
        }
        value.as_text().map(String::from)
    }
}

impl AttachmentLifecycle for AttachmentHooks {
    fn before_validate(&mut self, record: &mut Record) -> Result<()> {
        for field in self.registry.fields(&record.entity) {
            let Some(value) = record.get(field) else {
                continue;
            };
            let Some(url) = self.source_url(record, field, value) else {
                continue;
            };
            let fetcher = self.fetcher.as_ref().ok_or_else(|| {
                Error::fetch(format!("{} is a URL but no remote fetcher is configured", field))
            })?;

            let payload = fetcher.fetch(&url)?;
            info!(field, url = %url, size = payload.size, "Fetched remote source");
            record.set_upload(field, payload);
        }
        Ok(())
    }

    fn before_save(&mut self, record: &mut Record) -> Result<()> {
        self.staging.reset();
        let mut staged = record.clone();
        let fields: Vec<String> = self
            .registry
            .fields(&record.entity)
            .into_iter()
            .map(String::from)
            .collect();

        for field in &fields {
            let Some(payload) = record.upload(field).filter(|p| p.has_source()) else {
                continue;
            };
            let result = if staged.id.is_some() {
                self.staging
                    .prepare_delete(&staged, Some(field.as_str()), true, self.lookup.as_ref())
            } else {
                Ok(())
            }
            .and_then(|()| {
                let max_width = self.downscales.get(field).copied();
                self.staging
                    .prepare_write(&mut staged, field, payload.clone(), max_width)
                    .map(|_| ())
            });

            if let Err(e) = result {
                self.discard();
                return Err(e);
            }
        }

        *record = staged;
        Ok(())
    }

    fn after_save(&mut self, record: &Record, created: bool) -> Result<CommitReport> {
        let mut report = CommitReport::default();
        if !created {
            report.merge(self.staging.commit_deletes(&record.entity));
        }
        let writes = self.staging.commit_writes(record);
        self.discard();
        report.merge(writes?);
        Ok(report)
    }

    fn before_delete(&mut self, record: &Record) -> Result<()> {
        self.staging.reset();
        self.staging
            .prepare_delete(record, None, false, self.lookup.as_ref())
    }

    fn after_delete(&mut self, record: &Record) -> Result<CommitReport> {
        let report = self.staging.commit_deletes(&record.entity);
        self.discard();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AttachmentSpec;
    use assert_matches::assert_matches;
    use attachforge_common::RecordId;
    use std::path::Path;

    struct NoLookup;

    impl RecordLookup for NoLookup {
        fn stored_values(
            &self,
            _entity: &str,
            _id: &RecordId,
            columns: &[String],
        ) -> Result<BTreeMap<String, Option<String>>> {
            Ok(columns.iter().map(|c| (c.clone(), None)).collect())
        }
    }

    struct FileFetcher {
        dir: std::path::PathBuf,
    }

    impl RemoteFetcher for FileFetcher {
        fn fetch(&self, url: &str) -> Result<UploadPayload> {
            let path = self.dir.join("fetched.tmp");
            std::fs::write(&path, b"remote bytes")?;
            Ok(UploadPayload::from_remote_url(url, path, 12, "text/plain; charset=utf-8"))
        }
    }

    fn hooks(root: &Path, spec: AttachmentSpec) -> AttachmentHooks {
        let registry = AttachmentRegistry::builder()
            .web_root(root.to_string_lossy())
            .register("User", "avatar", spec)
            .build()
            .unwrap();
        AttachmentHooks::new(Arc::new(registry), Arc::new(NoLookup))
    }

    #[test]
    fn test_before_validate_fetches_url_field() {
        let root = tempfile::tempdir().unwrap();
        let mut hooks = hooks(root.path(), AttachmentSpec::default().with_url_field("avatar_url"))
            .with_fetcher(Arc::new(FileFetcher { dir: root.path().to_path_buf() }));

        let mut record = Record::new("User");
        record.set("avatar", FieldValue::Null);
        record.set_text("avatar_url", "https://example.com/img/notes.txt");
        hooks.before_validate(&mut record).unwrap();

        let upload = record.upload("avatar").unwrap();
        assert!(upload.remote);
        assert_eq!(upload.name, "notes.txt");
        assert_eq!(upload.content_type, "text/plain");
    }

    #[test]
    fn test_before_validate_fetches_bare_string() {
        let root = tempfile::tempdir().unwrap();
        let mut hooks = hooks(root.path(), AttachmentSpec::default())
            .with_fetcher(Arc::new(FileFetcher { dir: root.path().to_path_buf() }));

        let mut record = Record::new("User");
        record.set_text("avatar", "https://example.com/a.txt");
        hooks.before_validate(&mut record).unwrap();
        assert_eq!(record.upload("avatar").unwrap().name, "a.txt");
    }

    #[test]
    fn test_before_validate_without_fetcher() {
        let root = tempfile::tempdir().unwrap();
        let mut hooks = hooks(root.path(), AttachmentSpec::default());

        let mut untouched = Record::new("User");
        hooks.before_validate(&mut untouched).unwrap();

        let mut record = Record::new("User");
        record.set_text("avatar", "https://example.com/a.txt");
        assert_matches!(hooks.before_validate(&mut record), Err(Error::Fetch(_)));
    }

    #[test]
    fn test_before_save_failure_leaves_record_untouched() {
        let root = tempfile::tempdir().unwrap();
        let spec = AttachmentSpec::default().with_path(":webroot/missing/deeper/:basename.:extension");
        let mut hooks = hooks(root.path(), spec);

        let source = root.path().join("upload.tmp");
        std::fs::write(&source, b"data").unwrap();
        let mut record = Record::new("User");
        record.set_upload("avatar", UploadPayload::from_path(&source, "text/plain").unwrap());
        let before = record.clone();

        assert_matches!(hooks.before_save(&mut record), Err(Error::DirectoryAccess(_)));
        assert_eq!(record, before);
        assert!(!hooks.staging().has_pending());
    }

    #[test]
    fn test_before_save_ignores_uploads_without_source() {
        let root = tempfile::tempdir().unwrap();
        let mut hooks = hooks(root.path(), AttachmentSpec::default());

        let mut record = Record::new("User");
        record.set_upload("avatar", UploadPayload::new("a.jpg", root.path().join("nope"), 1, "image/jpeg"));
        hooks.before_save(&mut record).unwrap();

        assert!(record.upload("avatar").is_some());
        assert!(record.file_name("avatar").is_none());
    }

    #[test]
    fn test_max_width_with_resize_passes_and_records_downscale() {
        let root = tempfile::tempdir().unwrap();
        let spec = AttachmentSpec::default().with_resize_to_max_width(true);
        let mut hooks = hooks(root.path(), spec);

        let source = root.path().join("wide.tmp");
        image::DynamicImage::ImageRgb8(image::RgbImage::new(300, 10))
            .save_with_format(&source, image::ImageFormat::Png)
            .unwrap();
        let mut record = Record::new("User");
        record.set_upload("avatar", UploadPayload::from_path(&source, "image/png").unwrap());

        assert!(hooks.validate(&record, "avatar", &Rule::MaxWidth(100)));
        assert_eq!(hooks.downscales.get("avatar"), Some(&100));

        hooks.discard();
        assert!(hooks.downscales.is_empty());
    }
}

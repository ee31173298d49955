//! Deferred filesystem writes and deletes for one record mutation.
//!
//! Nothing touches the target directories until the persistence layer has
//! stored the record. `prepare_*` only records what should happen;
//! [`commit_deletes`](StagingManager::commit_deletes) and
//! [`commit_writes`](StagingManager::commit_writes) perform it, deletes first.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use attachforge_common::inflect::slug;
use attachforge_common::paths::{join_file_name, split_file_name};
use attachforge_common::{
    file_column, Error, Record, RecordId, RecordLookup, Result, UploadPayload,
};
use attachforge_geometry::{resize_file, Geometry, ResizeOptions, ResizeOutcome};
use tracing::{debug, info, warn};

use crate::interpolate::{resolve, ResolvedLocation};
use crate::registry::{AttachmentRegistry, MoveFailurePolicy, ORIGINAL_STYLE};

/// An upload waiting to be moved into place.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedWrite {
    pub payload: UploadPayload,
    /// Cleaned base file name stored on the record.
    pub file_name: String,
    pub original: ResolvedLocation,
    pub styles: BTreeMap<String, ResolvedLocation>,
    /// Downscale the original to this width before rendering styles.
    pub max_width: Option<u32>,
    resolved_for: Option<RecordId>,
}

/// Stored file names captured before the record is changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedDelete {
    pub id: Option<RecordId>,
    /// Field name to stored base file name. `None` when nothing was stored.
    pub file_names: BTreeMap<String, Option<String>>,
}

/// A write that did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWrite {
    pub field: String,
    pub style: String,
    pub path: PathBuf,
    pub reason: String,
}

/// What a commit did on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub skipped: Vec<SkippedWrite>,
}

impl CommitReport {
    pub fn merge(&mut self, other: CommitReport) {
        self.written.extend(other.written);
        self.deleted.extend(other.deleted);
        self.skipped.extend(other.skipped);
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.deleted.is_empty() && self.skipped.is_empty()
    }

    fn skip(&mut self, field: &str, style: &str, path: &Path, reason: impl ToString) {
        self.skipped.push(SkippedWrite {
            field: field.to_string(),
            style: style.to_string(),
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }
}

/// Make sure the directory that will hold `path` exists and is writable.
///
/// Only the immediate parent is created; a missing grandparent is an error.
pub fn ensure_writable(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    if let Ok(meta) = fs::metadata(dir) {
        if meta.is_dir() && can_write(dir) {
            return Ok(());
        }
        return Err(Error::DirectoryAccess(dir.to_path_buf()));
    }

    match fs::create_dir(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "Created upload directory");
            Ok(())
        }
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Cannot create upload directory");
            Err(Error::DirectoryAccess(dir.to_path_buf()))
        }
    }
}

/// Whether the current user may create entries in `dir`.
#[cfg(unix)]
fn can_write(dir: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};

    access(dir, AccessFlags::W_OK | AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn can_write(dir: &Path) -> bool {
    fs::metadata(dir).is_ok_and(|meta| !meta.permissions().readonly())
}

/// Suffix appended to a file stem when its target already exists.
///
/// Whether a name gets a suffix depends only on what is already on disk. The
/// suffix itself is random.
fn unique_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("_{}", &id[..13])
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices
}

/// Move a direct upload, copying when source and target are on different devices.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

/// Move `from` to `to`, failing with `AlreadyExists` if `to` exists.
///
/// The existence check and the creation are a single step: a hard link where
/// the filesystem allows it, otherwise an exclusive create followed by a copy.
fn move_exclusive(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => fs::remove_file(from),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(_) => {
            let mut source = fs::File::open(from)?;
            let mut target = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(to)?;
            if let Err(e) = io::copy(&mut source, &mut target) {
                drop(target);
                let _ = fs::remove_file(to);
                return Err(e);
            }
            fs::remove_file(from)
        }
    }
}

#[cfg(unix)]
fn make_world_readable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_world_readable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Per-operation staging state.
///
/// One manager serves one save or delete at a time. [`reset`](Self::reset)
/// starts a new operation; commits consume what was staged.
#[derive(Debug)]
pub struct StagingManager {
    registry: Arc<AttachmentRegistry>,
    writes: BTreeMap<String, StagedWrite>,
    deletes: Option<StagedDelete>,
}

impl StagingManager {
    pub fn new(registry: Arc<AttachmentRegistry>) -> Self {
        Self {
            registry,
            writes: BTreeMap::new(),
            deletes: None,
        }
    }

    pub fn registry(&self) -> &AttachmentRegistry {
        &self.registry
    }

    /// Drop everything staged so far.
    pub fn reset(&mut self) {
        self.writes.clear();
        self.deletes = None;
    }

    pub fn staged_write(&self, field: &str) -> Option<&StagedWrite> {
        self.writes.get(field)
    }

    pub fn staged_delete(&self) -> Option<&StagedDelete> {
        self.deletes.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        !self.writes.is_empty() || self.deletes.is_some()
    }

    /// Stage `payload` as the new file of `field`.
    ///
    /// The file name is slugged and resolved for the `original` style. If the
    /// field does not allow overwriting and that path is taken, the stem gets a
    /// random suffix. On success the record's `<field>_file_name`,
    /// `<field>_file_size` and `<field>_content_type` are set and the upload
    /// value itself is removed from it.
    pub fn prepare_write(
        &mut self,
        record: &mut Record,
        field: &str,
        payload: UploadPayload,
        max_width: Option<u32>,
    ) -> Result<&StagedWrite> {
        if !payload.has_source() {
            return Err(Error::MissingSource(payload.temp_path.clone()));
        }
        let spec = self.registry.require(&record.entity, field)?;
        let overwrite = spec.overwrite;

        let (stem, extension) = split_file_name(&payload.name);
        let mut stem = slug(stem);
        let mut file_name = join_file_name(&stem, extension);
        let id = record.id.as_ref();

        let mut original = resolve(&self.registry, &record.entity, id, field, &file_name, ORIGINAL_STYLE)?;
        ensure_writable(&original.path)?;

        if !overwrite && original.path.exists() {
            stem.push_str(&unique_suffix());
            file_name = join_file_name(&stem, extension);
            debug!(
                field,
                taken = %original.path.display(),
                file_name = %file_name,
                "Target exists, using unique file name"
            );
            original = resolve(&self.registry, &record.entity, id, field, &file_name, ORIGINAL_STYLE)?;
        }

        let styles = self.resolve_styles(&record.entity, id, field, &file_name)?;

        record.remove(field);
        record.set_text(file_column(field, "file_name"), file_name.clone());
        record.set(file_column(field, "file_size"), payload.size as i64);
        record.set_text(file_column(field, "content_type"), payload.content_type.clone());

        debug!(
            entity = %record.entity,
            field,
            path = %original.path.display(),
            "Staged write"
        );

        let staged = StagedWrite {
            payload,
            file_name,
            original,
            styles,
            max_width,
            resolved_for: record.id.clone(),
        };
        self.writes.insert(field.to_string(), staged);
        Ok(&self.writes[field])
    }

    fn resolve_styles(
        &self,
        entity: &str,
        id: Option<&RecordId>,
        field: &str,
        file_name: &str,
    ) -> Result<BTreeMap<String, ResolvedLocation>> {
        let spec = self.registry.require(entity, field)?;
        spec.styles
            .keys()
            .map(|style| {
                resolve(&self.registry, entity, id, field, file_name, style)
                    .map(|loc| (style.clone(), loc))
            })
            .collect()
    }

    /// Capture the stored file names of `field`, or of every attachment field
    /// of the entity when `field` is `None`.
    ///
    /// Values already on the in-memory record are used unless `force_read` is
    /// set or one of them is missing, in which case they are read through
    /// `lookup`. Repeated calls add to the same snapshot.
    pub fn prepare_delete(
        &mut self,
        record: &Record,
        field: Option<&str>,
        force_read: bool,
        lookup: &dyn RecordLookup,
    ) -> Result<()> {
        let fields: Vec<String> = match field {
            Some(f) => vec![f.to_string()],
            None => self
                .registry
                .fields(&record.entity)
                .into_iter()
                .map(String::from)
                .collect(),
        };
        if fields.is_empty() {
            return Ok(());
        }

        let columns: Vec<String> = fields.iter().map(|f| file_column(f, "file_name")).collect();
        let need_read = force_read || columns.iter().any(|c| !record.contains(c));

        let values: BTreeMap<String, Option<String>> = if !need_read {
            columns
                .iter()
                .map(|c| (c.clone(), record.text(c).map(String::from)))
                .collect()
        } else if let Some(id) = record.id.as_ref() {
            lookup.stored_values(&record.entity, id, &columns)?
        } else {
            BTreeMap::new()
        };

        let snapshot = self.deletes.get_or_insert_with(StagedDelete::default);
        snapshot.id = record.id.clone();
        for (field, column) in fields.into_iter().zip(columns.iter()) {
            let name = values
                .get(column)
                .cloned()
                .flatten()
                .filter(|n| !n.is_empty());
            snapshot.file_names.insert(field, name);
        }

        debug!(
            entity = %record.entity,
            id = ?record.id,
            read = need_read,
            "Staged delete"
        );
        Ok(())
    }

    /// Remove the original and every style file captured by `prepare_delete`.
    ///
    /// Missing files are ignored; other removal errors are logged.
    pub fn commit_deletes(&mut self, entity: &str) -> CommitReport {
        let mut report = CommitReport::default();
        let Some(snapshot) = self.deletes.take() else {
            return report;
        };

        for (field, name) in &snapshot.file_names {
            let Some(name) = name else {
                continue;
            };
            let Some(spec) = self.registry.spec(entity, field) else {
                continue;
            };
            for style in spec.style_names() {
                let loc = match resolve(&self.registry, entity, snapshot.id.as_ref(), field, name, style) {
                    Ok(loc) => loc,
                    Err(e) => {
                        warn!(field = %field, style, error = %e, "Cannot resolve file to delete");
                        continue;
                    }
                };
                match fs::remove_file(&loc.path) {
                    Ok(()) => {
                        debug!(path = %loc.path.display(), "Deleted file");
                        report.deleted.push(loc.path);
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %loc.path.display(), error = %e, "Failed to delete file");
                    }
                }
            }
        }

        if !report.deleted.is_empty() {
            info!(entity, count = report.deleted.len(), "Removed attachment files");
        }
        report
    }

    /// Move every staged upload into place and render its styles.
    ///
    /// Locations staged before the record had a primary key are resolved again
    /// with the key `record` now carries. A failed move is an error under
    /// [`MoveFailurePolicy::Strict`] and a logged skip under
    /// [`MoveFailurePolicy::Lenient`]. Style failures are always skips.
    ///
    /// Every staged field is attempted even after one fails; the first error
    /// is returned once all of them have run.
    pub fn commit_writes(&mut self, record: &Record) -> Result<CommitReport> {
        let mut report = CommitReport::default();
        let mut first_error = None;

        for (field, staged) in std::mem::take(&mut self.writes) {
            if let Err(e) = self.commit_write(record, &field, staged, &mut report) {
                warn!(entity = %record.entity, field = %field, error = %e, "Upload not stored");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn commit_write(
        &self,
        record: &Record,
        field: &str,
        mut staged: StagedWrite,
        report: &mut CommitReport,
    ) -> Result<()> {
        let options = |quality| ResizeOptions {
            quality,
            single_axis: self.registry.single_axis(),
        };

        if staged.resolved_for != record.id {
            let id = record.id.as_ref();
            staged.original = resolve(&self.registry, &record.entity, id, field, &staged.file_name, ORIGINAL_STYLE)?;
            staged.styles = self.resolve_styles(&record.entity, id, field, &staged.file_name)?;
        }
        let target = staged.original.path.clone();

        if let Err(e) = self.move_into_place(&staged) {
            match self.registry.move_failure() {
                MoveFailurePolicy::Strict => return Err(e),
                MoveFailurePolicy::Lenient => {
                    warn!(field = %field, path = %target.display(), error = %e, "Upload not moved, skipping");
                    report.skip(field, ORIGINAL_STYLE, &target, e);
                    return Ok(());
                }
            }
        }
        info!(entity = %record.entity, field = %field, path = %target.display(), "Stored upload");
        report.written.push(target.clone());

        if let Some(max) = staged.max_width {
            let geometry = Geometry::Width(max);
            match resize_file(&target, &target, &geometry, &options(staged.original.quality)) {
                Ok(ResizeOutcome::Written { width, .. }) => {
                    debug!(path = %target.display(), width, "Downscaled original to max width");
                }
                Ok(ResizeOutcome::Unsupported) => {}
                Err(e) => {
                    warn!(path = %target.display(), error = %e, "Failed to downscale original");
                }
            }
        }

        for (style, geometry) in &staged.original.styles {
            let Some(loc) = staged.styles.get(style) else {
                continue;
            };
            if let Err(e) = ensure_writable(&loc.path) {
                warn!(style = %style, error = %e, "Style directory not writable, skipping");
                report.skip(field, style, &loc.path, e);
                continue;
            }
            match resize_file(&target, &loc.path, geometry, &options(staged.original.quality)) {
                Ok(ResizeOutcome::Written { .. }) => report.written.push(loc.path.clone()),
                Ok(ResizeOutcome::Unsupported) => {
                    debug!(style = %style, path = %target.display(), "Not a resizable image, style omitted");
                    report.skip(field, style, &loc.path, "unsupported image format");
                }
                Err(e) => {
                    warn!(style = %style, path = %loc.path.display(), error = %e, "Failed to render style");
                    report.skip(field, style, &loc.path, e);
                }
            }
        }

        Ok(())
    }

    fn move_into_place(&self, staged: &StagedWrite) -> Result<()> {
        let from = &staged.payload.temp_path;
        let to = &staged.original.path;
        ensure_writable(to)?;

        let moved = if !staged.original.overwrite {
            move_exclusive(from, to)
        } else if staged.payload.remote {
            fs::rename(from, to)
        } else {
            move_file(from, to)
        };

        match moved {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists(to.clone()));
            }
            Err(source) => {
                return Err(Error::Move {
                    from: from.clone(),
                    to: to.clone(),
                    source,
                });
            }
        }

        if staged.payload.remote {
            if let Err(e) = make_world_readable(to) {
                warn!(path = %to.display(), error = %e, "Failed to set permissions on fetched file");
            }
        }
        Ok(())
    }
}

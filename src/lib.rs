//! Attachforge - record-bound file attachments
//!
//! Files uploaded against a record are staged while the record is validated
//! and saved, and only moved into place (with their image styles rendered)
//! once the persistence layer reports success. Deleting or replacing the file
//! removes the old original and every style.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use attachforge::registry::{AttachmentRegistry, AttachmentSpec};
//! use attachforge::repository::Repository;
//! use attachforge_common::{Record, UploadPayload};
//! use attachforge_db::{init_memory_pool, SqliteRecordStore};
//!
//! let registry = AttachmentRegistry::builder()
//!     .web_root("/srv/www")
//!     .register(
//!         "User",
//!         "avatar",
//!         AttachmentSpec::default().with_style("thumb", "100x100".parse().unwrap()),
//!     )
//!     .build()
//!     .unwrap();
//! let store = Arc::new(SqliteRecordStore::new(init_memory_pool().unwrap()));
//! let mut repo = Repository::new(Arc::new(registry), store);
//!
//! let mut user = Record::new("User");
//! user.set_upload("avatar", UploadPayload::new("me.jpg", "/tmp/upload-1", 2048, "image/jpeg"));
//! let report = repo.save(&mut user).unwrap();
//! println!("{} files written", report.written.len());
//! ```

pub mod config;
pub mod interpolate;
pub mod lifecycle;
pub mod registry;
pub mod repository;
pub mod staging;
pub mod validation;

pub use interpolate::{resolve, ResolvedLocation};
pub use lifecycle::{AttachmentHooks, AttachmentLifecycle, RemoteFetcher};
pub use registry::{AttachmentRegistry, AttachmentSpec, MoveFailurePolicy};
pub use repository::Repository;
pub use staging::{CommitReport, StagedDelete, StagedWrite, StagingManager};

//! Attachforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across attachforge:
//!
//! - **Record IDs**: A primary-key wrapper that accepts integers, UUIDs and strings
//! - **Record Model**: The in-memory field set a persistence layer hands to the hooks
//! - **Uploads**: The payload shape produced by upload decoders and remote fetchers
//! - **Persistence Traits**: The lookup and store capabilities the core requires
//! - **Inflection**: Table-name, plural and filename-slug helpers used by path templates
//! - **Path Utilities**: Functions to detect resizable image files by extension
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use attachforge_common::{Record, RecordId, Error, Result};
//! use attachforge_common::inflect::tableize;
//! use attachforge_common::paths::is_resizable_image;
//! use std::path::Path;
//!
//! let mut record = Record::new("UserProfile");
//! record.id = Some(RecordId::from(7));
//! record.set_text("name", "Ada");
//!
//! assert_eq!(tableize(&record.entity), "user_profiles");
//! assert!(is_resizable_image(Path::new("avatar.jpg")));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("record"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod inflect;
pub mod paths;
pub mod record;
pub mod store;
pub mod upload;

pub use error::{Error, Result};
pub use ids::RecordId;
pub use record::{file_column, FieldValue, Record, FILE_COLUMN_SUFFIXES};
pub use store::{RecordLookup, RecordStore};
pub use upload::UploadPayload;

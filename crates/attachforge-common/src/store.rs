//! Persistence-layer capabilities the attachment core depends on.
//!
//! The core never creates, updates or deletes records itself. It needs exactly
//! one capability from the persistence layer: reading the stored values of a
//! few columns by primary key ([`RecordLookup`]). [`RecordStore`] adds the
//! mutations a repository driver needs to run the full lifecycle.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::ids::RecordId;
use crate::record::Record;

/// Read-only point lookup of stored column values.
pub trait RecordLookup: Send + Sync {
    /// Read `columns` of the stored record `entity`/`id`.
    ///
    /// Columns that are not stored map to `None`. A missing record yields a
    /// map of `None` values rather than an error.
    fn stored_values(
        &self,
        entity: &str,
        id: &RecordId,
        columns: &[String],
    ) -> Result<BTreeMap<String, Option<String>>>;
}

/// Record mutations performed by the persistence layer.
pub trait RecordStore: RecordLookup {
    /// Persist a new record and return its generated primary key.
    fn insert(&self, record: &Record) -> Result<RecordId>;

    /// Persist the fields of an existing record.
    fn update(&self, record: &Record) -> Result<()>;

    /// Delete a record.
    fn delete(&self, entity: &str, id: &RecordId) -> Result<()>;
}

//! SQLite-backed [`RecordStore`].

use std::collections::BTreeMap;

use attachforge_common::{Error, Record, RecordId, RecordLookup, RecordStore, Result};

use crate::models::StoredRecord;
use crate::pool::{get_conn, DbPool};
use crate::queries::records;

/// Record store over a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: DbPool,
}

impl SqliteRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Load a stored record with all its fields.
    pub fn find(&self, entity: &str, id: &RecordId) -> Result<Option<StoredRecord>> {
        let conn = get_conn(&self.pool)?;
        records::get_record(&conn, entity, id)
    }
}

impl RecordLookup for SqliteRecordStore {
    fn stored_values(
        &self,
        entity: &str,
        id: &RecordId,
        columns: &[String],
    ) -> Result<BTreeMap<String, Option<String>>> {
        let conn = get_conn(&self.pool)?;
        records::get_fields(&conn, entity, id, columns)
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert(&self, record: &Record) -> Result<RecordId> {
        let conn = get_conn(&self.pool)?;
        let id = records::insert_record(&conn, &record.entity, record.persisted_fields())?;
        tracing::debug!(entity = %record.entity, id = %id, "Inserted record");
        Ok(id)
    }

    fn update(&self, record: &Record) -> Result<()> {
        let id = record
            .id
            .as_ref()
            .ok_or_else(|| Error::invalid_input("cannot update a record without an id"))?;
        let conn = get_conn(&self.pool)?;
        records::update_record(&conn, &record.entity, id, record.persisted_fields())
    }

    fn delete(&self, entity: &str, id: &RecordId) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        if records::delete_record(&conn, entity, id)? {
            Ok(())
        } else {
            Err(Error::not_found(format!("{} {}", entity, id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn test_lookup_round() {
        let store = SqliteRecordStore::new(init_memory_pool().unwrap());
        let mut record = Record::new("User");
        record.set_text("avatar_file_name", "pic.jpg");

        let id = store.insert(&record).unwrap();
        let values = store
            .stored_values("User", &id, &["avatar_file_name".to_string()])
            .unwrap();
        assert_eq!(values["avatar_file_name"].as_deref(), Some("pic.jpg"));

        let loaded = store.find("User", &id).unwrap().unwrap().into_record();
        assert_eq!(loaded.id, Some(id.clone()));
        assert_eq!(loaded.file_name("avatar"), Some("pic.jpg"));

        store.delete("User", &id).unwrap();
        assert!(matches!(store.delete("User", &id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_requires_id() {
        let store = SqliteRecordStore::new(init_memory_pool().unwrap());
        let record = Record::new("User");
        assert!(matches!(store.update(&record), Err(Error::InvalidInput(_))));
    }
}

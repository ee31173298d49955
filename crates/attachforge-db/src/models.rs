//! Rust models matching the database schema.

use std::collections::BTreeMap;

use attachforge_common::{FieldValue, Record, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record as stored in the `records`/`record_fields` tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub entity: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Rebuild the in-memory record the lifecycle hooks operate on.
    pub fn into_record(self) -> Record {
        let mut record = Record::new(self.entity).with_id(self.id);
        for (name, value) in self.fields {
            record.set(name, value);
        }
        record
    }
}

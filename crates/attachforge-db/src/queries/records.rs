//! Record database queries.
//!
//! Records are stored as a header row in `records` plus one row per column in
//! `record_fields`. Pending uploads are never written; only plain values are.

use std::collections::BTreeMap;

use attachforge_common::{Error, FieldValue, RecordId, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};

use crate::models::StoredRecord;

fn to_sql(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Null => Some(Value::Null),
        FieldValue::Text(s) => Some(Value::Text(s.clone())),
        FieldValue::Integer(n) => Some(Value::Integer(*n)),
        FieldValue::Upload(_) => None,
    }
}

fn from_sql(value: Value) -> FieldValue {
    match value {
        Value::Null | Value::Blob(_) => FieldValue::Null,
        Value::Integer(n) => FieldValue::Integer(n),
        Value::Real(f) => FieldValue::Text(f.to_string()),
        Value::Text(s) => FieldValue::Text(s),
    }
}

fn render(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Blob(_) => None,
        Value::Integer(n) => Some(n.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_id(entity: &str, id: &RecordId) -> Result<i64> {
    id.as_i64()
        .ok_or_else(|| Error::not_found(format!("{} {}", entity, id)))
}

fn exists(conn: &Connection, entity: &str, rowid: i64) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM records WHERE id = :id AND entity = :entity",
        rusqlite::named_params! { ":id": rowid, ":entity": entity },
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| Error::database(e.to_string()))
}

fn upsert_fields<'a>(
    conn: &Connection,
    rowid: i64,
    fields: impl Iterator<Item = (&'a str, &'a FieldValue)>,
) -> Result<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO record_fields (record_id, name, value) VALUES (:record_id, :name, :value)
             ON CONFLICT(record_id, name) DO UPDATE SET value = excluded.value",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    for (name, value) in fields {
        let Some(value) = to_sql(value) else {
            continue;
        };
        stmt.execute(rusqlite::named_params! {
            ":record_id": rowid,
            ":name": name,
            ":value": value,
        })
        .map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}

/// Insert a new record and its plain fields.
///
/// # Returns
///
/// * `Ok(RecordId)` - The generated primary key
/// * `Err(Error)` - If a database error occurs
pub fn insert_record<'a>(
    conn: &Connection,
    entity: &str,
    fields: impl Iterator<Item = (&'a str, &'a FieldValue)>,
) -> Result<RecordId> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO records (entity, created_at, updated_at) VALUES (:entity, :now, :now)",
        rusqlite::named_params! { ":entity": entity, ":now": now },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    let rowid = tx.last_insert_rowid();

    upsert_fields(&tx, rowid, fields)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(RecordId::from(rowid))
}

/// Write the plain fields of an existing record.
///
/// Fields not mentioned keep their stored values.
///
/// # Returns
///
/// * `Ok(())` - On success
/// * `Err(Error::NotFound)` - If the record does not exist
/// * `Err(Error)` - If a database error occurs
pub fn update_record<'a>(
    conn: &Connection,
    entity: &str,
    id: &RecordId,
    fields: impl Iterator<Item = (&'a str, &'a FieldValue)>,
) -> Result<()> {
    let rowid = row_id(entity, id)?;
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    if !exists(&tx, entity, rowid)? {
        return Err(Error::not_found(format!("{} {}", entity, id)));
    }

    upsert_fields(&tx, rowid, fields)?;
    tx.execute(
        "UPDATE records SET updated_at = :now WHERE id = :id",
        rusqlite::named_params! { ":now": Utc::now().to_rfc3339(), ":id": rowid },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))
}

/// Delete a record and its fields.
///
/// # Returns
///
/// * `Ok(true)` - The record existed and was deleted
/// * `Ok(false)` - There was no such record
pub fn delete_record(conn: &Connection, entity: &str, id: &RecordId) -> Result<bool> {
    let Some(rowid) = id.as_i64() else {
        return Ok(false);
    };
    let deleted = conn
        .execute(
            "DELETE FROM records WHERE id = :id AND entity = :entity",
            rusqlite::named_params! { ":id": rowid, ":entity": entity },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(deleted > 0)
}

/// Get a record with all its fields.
///
/// # Returns
///
/// * `Ok(Some(StoredRecord))` - The record if found
/// * `Ok(None)` - If the record does not exist
pub fn get_record(conn: &Connection, entity: &str, id: &RecordId) -> Result<Option<StoredRecord>> {
    let Some(rowid) = id.as_i64() else {
        return Ok(None);
    };

    let header = conn
        .query_row(
            "SELECT created_at, updated_at FROM records WHERE id = :id AND entity = :entity",
            rusqlite::named_params! { ":id": rowid, ":entity": entity },
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some((created_at, updated_at)) = header else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare("SELECT name, value FROM record_fields WHERE record_id = :id ORDER BY name")
        .map_err(|e| Error::database(e.to_string()))?;
    let fields = stmt
        .query_map(rusqlite::named_params! { ":id": rowid }, |row| {
            Ok((row.get::<_, String>(0)?, from_sql(row.get::<_, Value>(1)?)))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(Some(StoredRecord {
        id: RecordId::from(rowid),
        entity: entity.to_string(),
        fields,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }))
}

/// Read selected columns of a record, rendered as strings.
///
/// Every requested column appears in the result; columns that are not stored
/// (or the whole record being absent) map to `None`.
pub fn get_fields(
    conn: &Connection,
    entity: &str,
    id: &RecordId,
    names: &[String],
) -> Result<BTreeMap<String, Option<String>>> {
    let mut result: BTreeMap<String, Option<String>> =
        names.iter().map(|n| (n.clone(), None)).collect();

    let Some(rowid) = id.as_i64() else {
        return Ok(result);
    };

    let mut stmt = conn
        .prepare(
            "SELECT f.value FROM record_fields f
             JOIN records r ON r.id = f.record_id
             WHERE r.id = :id AND r.entity = :entity AND f.name = :name",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    for name in names {
        let value = stmt
            .query_row(
                rusqlite::named_params! { ":id": rowid, ":entity": entity, ":name": name },
                |row| row.get::<_, Value>(0),
            )
            .optional()
            .map_err(|e| Error::database(e.to_string()))?;
        result.insert(name.clone(), value.and_then(render));
    }

    Ok(result)
}

/// Count stored records of an entity type.
pub fn count_records(conn: &Connection, entity: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM records WHERE entity = :entity",
        rusqlite::named_params! { ":entity": entity },
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use attachforge_common::{Record, UploadPayload};

    fn sample() -> Record {
        let mut record = Record::new("User");
        record.set_text("name", "Ada");
        record.set_text("avatar_file_name", "pic.jpg");
        record.set("avatar_file_size", 1234i64);
        record.set("nickname", FieldValue::Null);
        record.set_upload(
            "avatar",
            UploadPayload::new("pic.jpg", "/tmp/x", 1234, "image/jpeg"),
        );
        record
    }

    #[test]
    fn test_insert_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let record = sample();

        let id = insert_record(&conn, "User", record.persisted_fields()).unwrap();
        let stored = get_record(&conn, "User", &id).unwrap().unwrap();

        assert_eq!(stored.entity, "User");
        assert_eq!(stored.fields.get("name"), Some(&FieldValue::from("Ada")));
        assert_eq!(stored.fields.get("avatar_file_size"), Some(&FieldValue::Integer(1234)));
        assert_eq!(stored.fields.get("nickname"), Some(&FieldValue::Null));
        assert!(!stored.fields.contains_key("avatar"));
    }

    #[test]
    fn test_get_respects_entity() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let id = insert_record(&conn, "User", sample().persisted_fields()).unwrap();

        assert!(get_record(&conn, "Post", &id).unwrap().is_none());
        assert!(get_record(&conn, "User", &RecordId::from("not-a-number")).unwrap().is_none());
    }

    #[test]
    fn test_update_merges_fields() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let id = insert_record(&conn, "User", sample().persisted_fields()).unwrap();

        let mut changes = Record::new("User");
        changes.set_text("avatar_file_name", "new.png");
        update_record(&conn, "User", &id, changes.persisted_fields()).unwrap();

        let stored = get_record(&conn, "User", &id).unwrap().unwrap();
        assert_eq!(stored.fields.get("avatar_file_name"), Some(&FieldValue::from("new.png")));
        assert_eq!(stored.fields.get("name"), Some(&FieldValue::from("Ada")));
    }

    #[test]
    fn test_update_missing_record() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let result = update_record(&conn, "User", &RecordId::from(99), std::iter::empty());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_get_fields_renders_and_fills_missing() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let id = insert_record(&conn, "User", sample().persisted_fields()).unwrap();

        let names = vec![
            "avatar_file_name".to_string(),
            "avatar_file_size".to_string(),
            "nickname".to_string(),
            "banner_file_name".to_string(),
        ];
        let values = get_fields(&conn, "User", &id, &names).unwrap();

        assert_eq!(values["avatar_file_name"].as_deref(), Some("pic.jpg"));
        assert_eq!(values["avatar_file_size"].as_deref(), Some("1234"));
        assert_eq!(values["nickname"], None);
        assert_eq!(values["banner_file_name"], None);
    }

    #[test]
    fn test_delete_cascades() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let id = insert_record(&conn, "User", sample().persisted_fields()).unwrap();

        assert!(delete_record(&conn, "User", &id).unwrap());
        assert!(!delete_record(&conn, "User", &id).unwrap());
        assert_eq!(count_records(&conn, "User").unwrap(), 0);

        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM record_fields", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }
}

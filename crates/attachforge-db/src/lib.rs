//! # attachforge-db
//!
//! SQLite record store for attachforge.
//!
//! Records are kept as an entity header plus a name/value row per column, so
//! any entity type can be stored without a schema change. The store implements
//! [`attachforge_common::RecordStore`] and backs the CLI's `attach` and
//! `detach` commands.
//!
//! ## Example
//!
//! ```
//! use attachforge_common::{Record, RecordStore};
//! use attachforge_db::{pool::init_memory_pool, SqliteRecordStore};
//!
//! let store = SqliteRecordStore::new(init_memory_pool().unwrap());
//! let mut record = Record::new("User");
//! record.set_text("name", "Ada");
//! let id = store.insert(&record).unwrap();
//! assert!(store.find("User", &id).unwrap().is_some());
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use models::StoredRecord;
pub use pool::{init_memory_pool, init_pool, DbPool};
pub use store::SqliteRecordStore;

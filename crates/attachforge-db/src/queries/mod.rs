//! Database query modules.
//!
//! - records: record insert/update/delete and column lookup

pub mod records;

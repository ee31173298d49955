//! Primary-key wrapper for records that own attachments.
//!
//! Primary-key generation belongs to the persistence layer, which may hand out
//! integers, UUIDs or opaque strings. `RecordId` stores the rendered form so it
//! can be substituted into path templates and used for lookups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a new random record ID.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the rendered identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the identifier as an integer key, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_id() {
        let id = RecordId::from(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_i64(), Some(42));
    }

    #[test]
    fn test_uuid_id() {
        let uuid = Uuid::new_v4();
        let id = RecordId::from(uuid);
        assert_eq!(id.as_str(), uuid.to_string());
        assert_eq!(id.as_i64(), None);
    }

    #[test]
    fn test_serde_transparent() {
        let id = RecordId::from("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_new_v4_unique() {
        assert_ne!(RecordId::new_v4(), RecordId::new_v4());
    }
}

//! Save and delete driver tying a [`RecordStore`] to the lifecycle hooks.

use std::sync::Arc;

use attachforge_common::{Error, Record, RecordLookup, RecordStore, Result};
use tracing::{debug, warn};

use crate::lifecycle::{AttachmentHooks, AttachmentLifecycle, RemoteFetcher};
use crate::registry::AttachmentRegistry;
use crate::staging::CommitReport;
use crate::validation::Rule;

/// A failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub rule: Rule,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.rule)
    }
}

/// Runs record mutations through the attachment lifecycle.
pub struct Repository<S> {
    store: Arc<S>,
    hooks: AttachmentHooks,
    rules: Vec<(String, Rule)>,
}

impl<S: RecordStore + 'static> Repository<S> {
    pub fn new(registry: Arc<AttachmentRegistry>, store: Arc<S>) -> Self {
        let lookup: Arc<dyn RecordLookup> = store.clone();
        Self {
            hooks: AttachmentHooks::new(registry, lookup),
            store,
            rules: Vec::new(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.hooks = self.hooks.with_fetcher(fetcher);
        self
    }

    /// Check `rule` against `field` on every save.
    pub fn with_rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((field.into(), rule));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hooks(&self) -> &AttachmentHooks {
        &self.hooks
    }

    /// Run the configured rules, returning every violation.
    pub fn validate(&mut self, record: &Record) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (field, rule) in &self.rules {
            if !self.hooks.validate(record, field, rule) {
                violations.push(Violation {
                    field: field.clone(),
                    rule: rule.clone(),
                });
            }
        }
        violations
    }

    /// Create or update `record` and commit its attachment files.
    ///
    /// A record without an id is inserted and receives the generated key.
    /// Nothing is persisted if validation or staging fails.
    pub fn save(&mut self, record: &mut Record) -> Result<CommitReport> {
        self.hooks.before_validate(record)?;

        let violations = self.validate(record);
        if !violations.is_empty() {
            self.hooks.discard();
            let list: Vec<String> = violations.iter().map(ToString::to_string).collect();
            return Err(Error::invalid_input(format!(
                "validation failed: {}",
                list.join("; ")
            )));
        }

        self.hooks.before_save(record)?;

        let created = record.id.is_none();
        let persisted = if created {
            self.store.insert(record).map(|id| {
                record.id = Some(id);
            })
        } else {
            self.store.update(record)
        };
        if let Err(e) = persisted {
            warn!(entity = %record.entity, error = %e, "Record not persisted, dropping staged files");
            self.hooks.discard();
            return Err(e);
        }

        debug!(entity = %record.entity, id = ?record.id, created, "Record persisted");
        self.hooks.after_save(record, created)
    }

    /// Delete `record` and every file attached to it.
    pub fn delete(&mut self, record: &Record) -> Result<CommitReport> {
        let id = record
            .id
            .as_ref()
            .ok_or_else(|| Error::invalid_input("cannot delete a record without an id"))?;

        self.hooks.before_delete(record)?;
        if let Err(e) = self.store.delete(&record.entity, id) {
            self.hooks.discard();
            return Err(e);
        }
        self.hooks.after_delete(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AttachmentSpec;
    use assert_matches::assert_matches;
    use attachforge_common::FieldValue;
    use attachforge_db::{init_memory_pool, SqliteRecordStore};

    fn repository(root: &std::path::Path) -> Repository<SqliteRecordStore> {
        let registry = AttachmentRegistry::builder()
            .web_root(root.to_string_lossy())
            .register("User", "avatar", AttachmentSpec::default())
            .build()
            .unwrap();
        let store = SqliteRecordStore::new(init_memory_pool().unwrap());
        Repository::new(Arc::new(registry), Arc::new(store))
            .with_rule("avatar", Rule::Presence)
            .with_rule("avatar", Rule::MaxSize(10))
    }

    #[test]
    fn test_validate_lists_every_violation() {
        let root = tempfile::tempdir().unwrap();
        let mut repo = repository(root.path());

        let violations = repo.validate(&Record::new("User"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].to_string(), "avatar: presence");
    }

    #[test]
    fn test_save_without_attachment_persists_fields() {
        let root = tempfile::tempdir().unwrap();
        let registry = AttachmentRegistry::builder()
            .web_root(root.path().to_string_lossy())
            .register("User", "avatar", AttachmentSpec::default())
            .build()
            .unwrap();
        let store = Arc::new(SqliteRecordStore::new(init_memory_pool().unwrap()));
        let mut repo = Repository::new(Arc::new(registry), Arc::clone(&store));

        let mut user = Record::new("User");
        user.set_text("name", "Ada");
        let report = repo.save(&mut user).unwrap();

        assert!(report.is_empty());
        let id = user.id.clone().unwrap();
        let stored = store.find("User", &id).unwrap().unwrap();
        assert_eq!(stored.fields["name"], FieldValue::from("Ada"));
    }

    #[test]
    fn test_save_rejected_by_rule() {
        let root = tempfile::tempdir().unwrap();
        let mut repo = repository(root.path());

        let mut user = Record::new("User");
        let err = repo.save(&mut user).unwrap_err();
        assert_matches!(err, Error::InvalidInput(msg) if msg.contains("avatar: presence"));
        assert!(user.id.is_none());
    }

    #[test]
    fn test_delete_requires_id() {
        let root = tempfile::tempdir().unwrap();
        let mut repo = repository(root.path());
        assert_matches!(repo.delete(&Record::new("User")), Err(Error::InvalidInput(_)));
    }
}

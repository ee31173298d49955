//! Common error types used throughout attachforge.
//!
//! This module provides a unified error type covering the failure cases of the
//! attachment lifecycle: unusable target directories, failed moves at commit
//! time, exclusive-create conflicts, configuration problems, persistence
//! collaborator failures and I/O.

use std::path::PathBuf;

/// Common error type for attachforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target directory is not writable and could not be created.
    ///
    /// Raised while preparing a write; the owning record must not be persisted.
    #[error("Directory is not writable: {}", .0.display())]
    DirectoryAccess(PathBuf),

    /// Moving an upload into its resolved location failed at commit time.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another operation created the target file first (overwrite disabled).
    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The upload's temporary source file is not readable.
    #[error("Upload source is missing: {}", .0.display())]
    MissingSource(PathBuf),

    /// The requested record or setting was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The attachment configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persistence-layer operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Rendering or encoding a style derivative failed.
    #[error("Image error: {0}")]
    Image(String),

    /// Fetching a remote source failed.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidConfig error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Image error.
    pub fn image<S: Into<String>>(msg: S) -> Self {
        Self::Image(msg.into())
    }

    /// Create a new Fetch error.
    pub fn fetch<S: Into<String>>(msg: S) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must abort the operation before the record is persisted.
    pub fn is_directory_access(&self) -> bool {
        matches!(self, Self::DirectoryAccess(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DirectoryAccess(PathBuf::from("/srv/upload/users"));
        assert_eq!(
            err.to_string(),
            "Directory is not writable: /srv/upload/users"
        );

        let err = Error::AlreadyExists(PathBuf::from("/tmp/a.jpg"));
        assert_eq!(err.to_string(), "File already exists: /tmp/a.jpg");

        let err = Error::not_found("record 5");
        assert_eq!(err.to_string(), "Not found: record 5");

        let err = Error::invalid_config("quality must be 1..=100");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: quality must be 1..=100"
        );

        let err = Error::database("locked");
        assert_eq!(err.to_string(), "Database error: locked");
    }

    #[test]
    fn test_move_error_display() {
        let err = Error::Move {
            from: PathBuf::from("/tmp/php123"),
            to: PathBuf::from("/srv/a.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "Failed to move /tmp/php123 to /srv/a.jpg: denied");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_directory_access() {
        assert!(Error::DirectoryAccess(PathBuf::from("/x")).is_directory_access());
        assert!(!Error::internal("bug").is_directory_access());
    }
}

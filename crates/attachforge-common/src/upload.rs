//! Upload payloads.
//!
//! An [`UploadPayload`] describes a file that has been received (decoded from a
//! request or fetched from a URL) and parked at a temporary path, waiting to be
//! staged against a record.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A received file waiting to be attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPayload {
    /// Original client-side file name.
    pub name: String,
    /// Where the received bytes currently live.
    pub temp_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// MIME type declared by the client or the remote server.
    pub content_type: String,
    /// True when fetched from a URL rather than uploaded directly.
    pub remote: bool,
}

impl UploadPayload {
    /// Create a payload for a direct upload.
    pub fn new(
        name: impl Into<String>,
        temp_path: impl Into<PathBuf>,
        size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            temp_path: temp_path.into(),
            size,
            content_type: content_type.into(),
            remote: false,
        }
    }

    /// Create a payload for a file fetched from `url` and saved at `temp_path`.
    ///
    /// The name is the last path segment of the URL and any parameters after
    /// `;` are stripped from the content type.
    ///
    /// # Examples
    ///
    /// ```
    /// use attachforge_common::UploadPayload;
    ///
    /// let p = UploadPayload::from_remote_url(
    ///     "https://cdn.example.com/img/cat.png",
    ///     "/tmp/fetch-1.png",
    ///     512,
    ///     "image/png; charset=binary",
    /// );
    /// assert_eq!(p.name, "cat.png");
    /// assert_eq!(p.content_type, "image/png");
    /// assert!(p.remote);
    /// ```
    pub fn from_remote_url(
        url: &str,
        temp_path: impl Into<PathBuf>,
        size: u64,
        content_type: &str,
    ) -> Self {
        let name = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        Self {
            name,
            temp_path: temp_path.into(),
            size,
            content_type,
            remote: true,
        }
    }

    /// Create a payload from a file already on disk, reading its size.
    pub fn from_path(path: &Path, content_type: impl Into<String>) -> std::io::Result<Self> {
        let size = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self::new(name, path, size, content_type))
    }

    /// Whether the temporary source exists and is a regular file.
    pub fn has_source(&self) -> bool {
        !self.temp_path.as_os_str().is_empty() && self.temp_path.is_file()
    }
}

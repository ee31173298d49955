//! Path utilities for splitting file names and detecting resizable images.
//!
//! Style derivatives are only produced for the raster formats the resizer can
//! both decode and re-encode: GIF, JPEG and PNG.

use std::path::Path;

/// Extensions the resizer accepts, compared case-insensitively.
const RESIZABLE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png"];

/// Check if a path has an extension the resizer can process.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use attachforge_common::paths::is_resizable_image;
///
/// assert!(is_resizable_image(Path::new("poster.JPG")));
/// assert!(is_resizable_image(Path::new("/path/to/image.png")));
/// assert!(!is_resizable_image(Path::new("scan.tiff")));
/// assert!(!is_resizable_image(Path::new("README")));
/// ```
pub fn is_resizable_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| RESIZABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Get the list of resizable image extensions.
pub fn resizable_extensions() -> &'static [&'static str] {
    RESIZABLE_EXTENSIONS
}

/// Split a file name into stem and extension at the last dot.
///
/// A name without a dot (or whose only dot is the first character) has an
/// empty extension.
///
/// # Examples
///
/// ```
/// use attachforge_common::paths::split_file_name;
///
/// assert_eq!(split_file_name("pic.jpg"), ("pic", "jpg"));
/// assert_eq!(split_file_name("archive.tar.gz"), ("archive.tar", "gz"));
/// assert_eq!(split_file_name("README"), ("README", ""));
/// assert_eq!(split_file_name(".env"), (".env", ""));
/// ```
pub fn split_file_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(pos) => (&name[..pos], &name[pos + 1..]),
    }
}

/// Join a stem and extension back into a file name.
pub fn join_file_name(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

//! Error types for attachforge-geometry

/// Errors that can occur while parsing geometries or producing derivatives
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// Geometry string does not match any supported pattern
    #[error("Invalid geometry: {0:?}")]
    InvalidGeometry(String),

    /// The image container is not one the resizer handles
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Decoding, resampling or encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for attachforge-geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

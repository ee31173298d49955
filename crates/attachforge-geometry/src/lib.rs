//! # attachforge-geometry
//!
//! Geometry-driven derivative generation for uploaded images.
//!
//! A geometry string describes the target box and how the source is fitted
//! into it. The output size and placement depend only on the source
//! dimensions and the geometry, so derivatives are reproducible.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use attachforge_geometry::{resize_file, Geometry, ResizeOptions, ResizeOutcome};
//!
//! let thumb: Geometry = "100x100".parse().unwrap();
//! let outcome = resize_file(
//!     Path::new("upload/pic.jpg"),
//!     Path::new("upload/thumb-pic.jpg"),
//!     &thumb,
//!     &ResizeOptions { quality: 85, ..Default::default() },
//! )
//! .unwrap();
//!
//! if let ResizeOutcome::Written { width, height } = outcome {
//!     println!("thumb is {}x{}", width, height);
//! }
//! ```

pub mod error;
pub mod geometry;
pub mod plan;
pub mod render;

pub use error::{GeometryError, Result};
pub use geometry::Geometry;
pub use plan::{ResizePlan, SingleAxis};
pub use render::{
    decode, encode, read_dimensions, render, resize_file, OutputFormat, ResizeOptions,
    ResizeOutcome,
};

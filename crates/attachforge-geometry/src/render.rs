//! Rendering a [`ResizePlan`] onto a white canvas and encoding the result.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use tracing::debug;

use crate::error::{GeometryError, Result};
use crate::geometry::Geometry;
use crate::plan::{ResizePlan, SingleAxis};

/// Background used for band padding and transparent source pixels.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Output formats the resizer can write. Chosen from the source extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Gif,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Map a file extension (case-insensitive) to an output format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gif" => Some(Self::Gif),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Map a path's extension to an output format.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the encoder honours the quality setting.
    pub fn uses_quality(&self) -> bool {
        !matches!(self, Self::Png)
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            Self::Gif => ImageFormat::Gif,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

/// Settings applied to every derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOptions {
    /// 1-100, higher is larger and less lossy. Ignored for PNG.
    pub quality: u8,
    pub single_axis: SingleAxis,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            quality: 95,
            single_axis: SingleAxis::Legacy,
        }
    }
}

/// What [`resize_file`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// A derivative of the given size was written.
    Written { width: u32, height: u32 },
    /// The source extension is not GIF, JPEG or PNG; nothing was written.
    Unsupported,
}

/// One axis of the part of the scaled source that lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    /// Canvas start and length.
    dest: u32,
    len: u32,
    /// Matching source start and length, in unscaled source pixels.
    src: u32,
    src_len: u32,
}

fn visible_span(offset: i64, scaled: u32, canvas: u32, source: u32) -> Option<Span> {
    let start = offset.max(0);
    let end = (offset + i64::from(scaled)).min(i64::from(canvas));
    if end <= start {
        return None;
    }

    // Positions inside the scaled image, mapped back onto the source.
    let scaled = u64::from(scaled.max(1));
    let source = u64::from(source.max(1));
    let lo = (start - offset) as u64;
    let hi = (end - offset) as u64;
    let src = (lo * source / scaled).min(source - 1);
    let src_end = (hi * source).div_ceil(scaled).clamp(src + 1, source);

    Some(Span {
        dest: start as u32,
        len: (end - start) as u32,
        src: src as u32,
        src_len: (src_end - src) as u32,
    })
}

/// Render `src` according to `plan`.
///
/// The canvas is filled white first. Only the source rectangle that ends up
/// visible is cropped and resampled, straight to its size on the canvas, so
/// no buffer is ever larger than the source or the canvas.
pub fn render(src: &DynamicImage, plan: &ResizePlan) -> RgbaImage {
    let source = src.to_rgba8();
    let mut canvas = RgbaImage::from_pixel(plan.canvas_width, plan.canvas_height, BACKGROUND);

    let (Some(x), Some(y)) = (
        visible_span(plan.offset_x, plan.scaled_width, plan.canvas_width, source.width()),
        visible_span(plan.offset_y, plan.scaled_height, plan.canvas_height, source.height()),
    ) else {
        return canvas;
    };

    let region = imageops::crop_imm(&source, x.src, y.src, x.src_len, y.src_len).to_image();
    let scaled = if region.dimensions() == (x.len, y.len) {
        region
    } else {
        imageops::resize(&region, x.len, y.len, FilterType::CatmullRom)
    };

    imageops::overlay(&mut canvas, &scaled, i64::from(x.dest), i64::from(y.dest));
    canvas
}

/// Map 1-100 quality onto the GIF quantizer speed (1 = best, 30 = fastest).
fn gif_speed(quality: u8) -> i32 {
    let q = i32::from(quality.clamp(1, 100));
    1 + (100 - q) * 29 / 99
}

/// Encode a rendered canvas.
pub fn encode<W: Write>(
    canvas: &RgbaImage,
    format: OutputFormat,
    quality: u8,
    writer: W,
) -> Result<()> {
    let (width, height) = canvas.dimensions();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
        OutputFormat::Png => {
            let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
            PngEncoder::new(writer).write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
        OutputFormat::Gif => {
            let mut encoder = GifEncoder::new_with_speed(writer, gif_speed(quality));
            encoder.encode(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
    }
    Ok(())
}

/// Decode an image file, insisting on the format its extension promises.
pub fn decode(path: &Path) -> Result<DynamicImage> {
    let format = OutputFormat::from_path(path)
        .ok_or_else(|| GeometryError::UnsupportedFormat(path.display().to_string()))?;
    let mut reader = ImageReader::open(path)?;
    reader.set_format(format.image_format());
    Ok(reader.decode()?)
}

/// Produce the `geometry` derivative of `src` at `dest`.
///
/// The output format follows the source extension. Sources that are not GIF,
/// JPEG or PNG are skipped. `src` and `dest` may be the same path: the source
/// is fully decoded before the destination is opened.
pub fn resize_file(
    src: &Path,
    dest: &Path,
    geometry: &Geometry,
    options: &ResizeOptions,
) -> Result<ResizeOutcome> {
    let Some(format) = OutputFormat::from_path(src) else {
        debug!(src = %src.display(), "Skipping resize of unsupported format");
        return Ok(ResizeOutcome::Unsupported);
    };

    let image = decode(src)?;
    let plan = geometry.plan(image.width(), image.height(), options.single_axis);
    let canvas = render(&image, &plan);

    let mut writer = BufWriter::new(File::create(dest)?);
    encode(&canvas, format, options.quality, &mut writer)?;
    writer.flush()?;

    debug!(
        src = %src.display(),
        dest = %dest.display(),
        geometry = %geometry,
        width = plan.canvas_width,
        height = plan.canvas_height,
        "Derivative written"
    );

    Ok(ResizeOutcome::Written {
        width: plan.canvas_width,
        height: plan.canvas_height,
    })
}

/// Read an image's dimensions from its header without decoding pixels.
///
/// Only GIF, JPEG and PNG content is accepted; the format is sniffed from the
/// bytes, not the file name.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    match reader.format() {
        Some(ImageFormat::Gif | ImageFormat::Jpeg | ImageFormat::Png) => {
            Ok(reader.into_dimensions()?)
        }
        other => Err(GeometryError::UnsupportedFormat(format!("{:?}", other))),
    }
}

//! Advisory JPEG re-encoding of viewport captures
//!
//! Captures come out of the backend as PNG, which is large for photographic
//! content. Before upload the capture is flattened, optionally downscaled,
//! and re-encoded as JPEG. Compression is advisory end to end: the caller
//! falls back to the original capture on any failure here.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

use crate::{Error, Result};

/// Compressor configuration
#[derive(Debug, Clone)]
pub struct CompressionSettings {
    /// When false the orchestrator skips compression and uploads the PNG
    pub enabled: bool,
    /// JPEG quality on the 0-100 perceptual scale
    pub quality: u8,
    /// Captures wider than this are downscaled proportionally
    pub max_width: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: 85,
            max_width: 1920,
        }
    }
}

/// Re-encode the raster at `input` as a JPEG at `output`.
///
/// Transparency is flattened onto an opaque white background (alpha is not
/// meaningful for a photographic re-encode), and images wider than
/// `max_width` are downscaled proportionally with a Lanczos filter. The
/// input file is left untouched so the caller can fall back to it.
pub fn compress_to_jpeg(input: &Path, output: &Path, settings: &CompressionSettings) -> Result<()> {
    let decoded = image::open(input)
        .map_err(|e| Error::Compression(format!("Failed to decode capture: {}", e)))?;

    let mut flat = flatten_to_white(decoded);

    if flat.width() > settings.max_width {
        let scaled_height = ((flat.height() as u64 * settings.max_width as u64)
            / flat.width() as u64)
            .max(1) as u32;
        flat = image::imageops::resize(&flat, settings.max_width, scaled_height, FilterType::Lanczos3);
    }

    let file = File::create(output)
        .map_err(|e| Error::Compression(format!("Failed to create output: {}", e)))?;
    let mut writer = BufWriter::new(file);

    JpegEncoder::new_with_quality(&mut writer, settings.quality)
        .encode_image(&flat)
        .map_err(|e| Error::Compression(format!("JPEG encoding failed: {}", e)))?;

    Ok(())
}

/// Composite any alpha channel over an opaque white background.
fn flatten_to_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    rgb
}

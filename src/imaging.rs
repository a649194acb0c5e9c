// src/imaging.rs
//! Keeps artwork images under the publisher's blob size ceiling.
//!
//! | Step | `image` crate call |
//! |---|---|
//! | Decode | `image::load_from_memory` |
//! | Downsample | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Re-encode | `JpegEncoder::new_with_quality` on RGB8 |

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use metrics::histogram;
use tracing::{debug, warn};

/// Slightly under Bluesky's 976.56 KB blob ceiling.
pub const DEFAULT_SIZE_LIMIT: usize = 950_000;
pub const DEFAULT_SCALE: f32 = 0.8;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
pub const DEFAULT_MAX_ITERATIONS: u32 = 8;

#[derive(Debug, Clone)]
pub struct ImagePreparer {
    size_limit: usize,
    scale: f32,
    quality: u8,
    max_iterations: u32,
}

/// Bytes ready for upload plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    /// Downsample passes performed; 0 means the input was already small enough.
    pub iterations: u32,
    pub within_limit: bool,
}

impl Default for ImagePreparer {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE_LIMIT)
    }
}

impl ImagePreparer {
    pub fn new(size_limit: usize) -> Self {
        Self {
            size_limit,
            scale: DEFAULT_SCALE,
            quality: DEFAULT_JPEG_QUALITY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    /// Return `raw` untouched when it fits; otherwise shrink and re-encode as
    /// JPEG until it fits or `max_iterations` passes were made, in which case
    /// the last (smallest) encoding is returned.
    pub fn prepare(&self, raw: Vec<u8>) -> Result<PreparedImage> {
        if raw.len() <= self.size_limit {
            return Ok(PreparedImage {
                bytes: raw,
                iterations: 0,
                within_limit: true,
            });
        }

        let original_len = raw.len();
        let mut img = image::load_from_memory(&raw).context("decoding oversized image")?;
        drop(raw);

        let mut bytes = Vec::new();
        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            img = self.shrink(&img);
            bytes = self.encode_jpeg(&img)?;
            debug!(
                iteration = iterations,
                width = img.width(),
                height = img.height(),
                size = bytes.len(),
                "downsampled image"
            );
            if bytes.len() <= self.size_limit {
                break;
            }
        }
        histogram!("image_downsample_iterations").record(iterations as f64);

        let within_limit = bytes.len() <= self.size_limit;
        if !within_limit {
            warn!(
                original = original_len,
                size = bytes.len(),
                limit = self.size_limit,
                iterations,
                "image still over size limit after max iterations; using best effort"
            );
        }
        Ok(PreparedImage {
            bytes,
            iterations,
            within_limit,
        })
    }

    fn shrink(&self, img: &DynamicImage) -> DynamicImage {
        let w = ((img.width() as f32 * self.scale) as u32).max(1);
        let h = ((img.height() as f32 * self.scale) as u32).max(1);
        img.resize_exact(w, h, FilterType::Lanczos3)
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        // JPEG has no alpha channel.
        let rgb = img.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .context("encoding jpeg")?;
        Ok(out)
    }
}

/// MIME type sniffed from the image header, for blob uploads.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

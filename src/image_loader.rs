//! # Image Loading and Decoding
//!
//! Resolves [`ImageRef`]s to decoded RGBA bitmaps for drawing. Sources are
//! file paths, data URIs and raw base64 strings; http(s) URLs are fetched
//! only with the `remote` feature.
//!
//! Decoding reads the header dimensions first, applies the EXIF orientation
//! and downsamples to the requested maximum edge before the bitmap is handed
//! back, so a 12-megapixel phone photo never reaches the page at full size.
//! Every failure is logged and reported as `None`; callers draw a
//! placeholder instead.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageDecoder, ImageReader, Limits};

use crate::canvas::Bitmap;
use crate::model::ImageRef;

/// Resolves image references to bitmaps.
pub trait ImageFetcher {
    /// A decoded, orientation-corrected bitmap whose longest edge is at most
    /// `max_dimension`, or `None` if the image is unavailable.
    fn fetch(&self, image: &ImageRef, max_dimension: u32) -> Option<Bitmap>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&ImageRef, u32) -> Option<Bitmap>,
{
    fn fetch(&self, image: &ImageRef, max_dimension: u32) -> Option<Bitmap> {
        self(image, max_dimension)
    }
}

/// A fetcher that never finds anything.
pub struct NoImages;

impl ImageFetcher for NoImages {
    fn fetch(&self, _image: &ImageRef, _max_dimension: u32) -> Option<Bitmap> {
        None
    }
}

/// Loads images from disk, inline data, and (with `remote`) the network.
pub struct LocalImageLoader {
    base_dir: Option<PathBuf>,
    #[cfg(feature = "remote")]
    agent: ureq::Agent,
}

#[cfg(feature = "remote")]
const REMOTE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

#[cfg(feature = "remote")]
const MAX_REMOTE_BYTES: u64 = 32 * 1024 * 1024;

impl Default for LocalImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalImageLoader {
    pub fn new() -> Self {
        Self {
            base_dir: None,
            #[cfg(feature = "remote")]
            agent: ureq::AgentBuilder::new().timeout(REMOTE_TIMEOUT).build(),
        }
    }

    /// Resolve relative paths against `dir` instead of the working
    /// directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn read_bytes(&self, image: &ImageRef) -> Result<Vec<u8>, String> {
        match image {
            ImageRef::Local(path) => {
                let path = Path::new(path);
                let resolved = match &self.base_dir {
                    Some(base) if path.is_relative() => base.join(path),
                    _ => path.to_path_buf(),
                };
                std::fs::read(&resolved)
                    .map_err(|e| format!("failed to read '{}': {}", resolved.display(), e))
            }
            ImageRef::Inline(src) => decode_inline(src),
            ImageRef::Remote(url) => self.read_remote(url),
        }
    }

    #[cfg(feature = "remote")]
    fn read_remote(&self, url: &str) -> Result<Vec<u8>, String> {
        use std::io::Read;

        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| format!("failed to fetch URL: {}", e))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_REMOTE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| format!("failed to read response: {}", e))?;
        Ok(bytes)
    }

    #[cfg(not(feature = "remote"))]
    fn read_remote(&self, url: &str) -> Result<Vec<u8>, String> {
        Err(format!(
            "remote images need the `remote` feature, skipping '{}'",
            url
        ))
    }
}

impl ImageFetcher for LocalImageLoader {
    fn fetch(&self, image: &ImageRef, max_dimension: u32) -> Option<Bitmap> {
        let result = self
            .read_bytes(image)
            .and_then(|bytes| decode_bitmap(&bytes, max_dimension));
        match result {
            Ok(bitmap) => Some(bitmap),
            Err(e) => {
                tracing::warn!(source = %short_source(image), "image unavailable: {}", e);
                None
            }
        }
    }
}

fn short_source(image: &ImageRef) -> String {
    let s = image.as_str();
    if s.chars().count() > 64 {
        format!("{}...", s.chars().take(64).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Data URI (`data:image/...;base64,...`) or raw base64 payload.
fn decode_inline(src: &str) -> Result<Vec<u8>, String> {
    use base64::Engine;
    let payload = if let Some(rest) = src.strip_prefix("data:") {
        let comma = rest
            .find(',')
            .ok_or_else(|| "invalid data URI: missing comma".to_string())?;
        if !rest[..comma].ends_with(";base64") {
            return Err("only base64 data URIs are supported".to_string());
        }
        &rest[comma + 1..]
    } else {
        src
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| format!("base64 decode error: {}", e))
}

/// Largest source image, in pixels, that is decoded at all. 64 MP covers
/// current phone cameras; a bigger header is rejected before any pixel
/// buffer is allocated.
pub const MAX_SOURCE_PIXELS: u64 = 64 * 1024 * 1024;

/// Decode encoded image bytes to an upright RGBA bitmap no larger than
/// `max_dimension` on its longest edge.
pub fn decode_bitmap(data: &[u8], max_dimension: u32) -> Result<Bitmap, String> {
    decode_bitmap_within(data, max_dimension, MAX_SOURCE_PIXELS)
}

/// [`decode_bitmap`] with an explicit source pixel budget. The header is
/// checked against the budget first, and the decoder runs under
/// `image::Limits` sized from it, so an oversize source fails instead of
/// allocating at full size.
pub fn decode_bitmap_within(data: &[u8], max_dimension: u32, max_source_pixels: u64) -> Result<Bitmap, String> {
    if data.len() < 4 {
        return Err("image data too short".to_string());
    }
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("format detection error: {}", e))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| format!("unsupported image: {}", e))?;

    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err("image has no pixels".to_string());
    }
    let pixels = width as u64 * height as u64;
    if pixels > max_source_pixels {
        return Err(format!(
            "image is {}x{}, over the {} pixel decode budget",
            width, height, max_source_pixels
        ));
    }
    let mut limits = Limits::default();
    limits.max_image_width = Some(width);
    limits.max_image_height = Some(height);
    // RGBA8 output plus one working buffer of the same size
    limits.max_alloc = Some(max_source_pixels.saturating_mul(8));
    decoder
        .set_limits(limits)
        .map_err(|e| format!("decode limits rejected image: {}", e))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(image::metadata::Orientation::NoTransforms);

    let mut img =
        DynamicImage::from_decoder(decoder).map_err(|e| format!("decode failed: {}", e))?;
    img.apply_orientation(orientation);

    let limit = max_dimension.max(1);
    if width.max(height) > limit {
        img = img.thumbnail(limit, limit);
    }
    tracing::debug!(
        width,
        height,
        out_width = img.width(),
        out_height = img.height(),
        "decoded image"
    );
    Ok(img.to_rgba8())
}

/// Stand-in logo for reports without one: a slate badge with a light
/// building silhouette.
pub fn default_logo() -> Bitmap {
    const SIZE: u32 = 96;
    let slate = image::Rgba([0x0F, 0x3D, 0x5E, 0xFF]);
    let light = image::Rgba([0xE5, 0xE7, 0xEB, 0xFF]);
    let clear = image::Rgba([0, 0, 0, 0]);
    let center = (SIZE as f64 - 1.0) / 2.0;
    let radius = SIZE as f64 / 2.0;

    Bitmap::from_fn(SIZE, SIZE, |x, y| {
        let dx = x as f64 - center;
        let dy = y as f64 - center;
        if dx * dx + dy * dy > radius * radius {
            return clear;
        }
        // Two towers of different heights on a shared base line.
        let in_left = (26..44).contains(&x) && (34..70).contains(&y);
        let in_right = (50..70).contains(&x) && (22..70).contains(&y);
        let in_base = (20..76).contains(&x) && (70..74).contains(&y);
        if in_left || in_right || in_base {
            light
        } else {
            slate
        }
    })
}

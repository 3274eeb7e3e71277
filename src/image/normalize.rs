//! Image normalization: HEIC to JPEG conversion and optional compression.
//!
//! Everything that leaves the normalizer is a web-safe raster image the model
//! can read. Failures are returned as [`PlantIdError::Conversion`]; the
//! original bytes are never passed through as a fallback.

use crate::error::{PlantIdError, Result};
use crate::image::types::{ImageBlob, ImageFormat};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

/// JPEG quality used for HEIC conversion (0.9).
pub const HEIC_JPEG_QUALITY: u8 = 90;

/// Filename given to converted HEIC uploads.
pub const CONVERTED_FILENAME: &str = "converted-image.jpg";

/// Qualities tried, in order, while compressing.
const COMPRESSION_QUALITIES: &[u8] = &[85, 75, 65, 55, 45];

/// Compression gives up once the shorter side would drop below this.
const MIN_COMPRESSED_DIMENSION: u32 = 64;

/// Decodes HEIC/HEIF containers into pixels.
pub trait HeifDecoder: Send + Sync {
    /// Decodes the primary image of the container.
    fn decode(&self, data: &[u8]) -> Result<DynamicImage>;
}

/// HEIF decoder backed by libheif.
#[cfg(feature = "heic")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LibHeifDecoder;

#[cfg(feature = "heic")]
impl HeifDecoder for LibHeifDecoder {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let lib = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(data)
            .map_err(|e| PlantIdError::conversion_with("failed to open HEIF container", e))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| PlantIdError::conversion_with("HEIF file has no primary image", e))?;
        let decoded = lib
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| PlantIdError::conversion_with("failed to decode HEIF image", e))?;

        let plane = decoded
            .planes()
            .interleaved
            .ok_or_else(|| PlantIdError::conversion("HEIF image has no interleaved RGB plane"))?;

        let (width, height) = (plane.width, plane.height);
        let row_len = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(plane.stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_len]);
        }

        image::RgbImage::from_raw(width, height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| PlantIdError::conversion("HEIF plane size does not match dimensions"))
    }
}

/// Decoder used when the crate is built without the `heic` feature.
#[cfg(not(feature = "heic"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedHeifDecoder;

#[cfg(not(feature = "heic"))]
impl HeifDecoder for UnsupportedHeifDecoder {
    fn decode(&self, _data: &[u8]) -> Result<DynamicImage> {
        Err(PlantIdError::conversion(
            "HEIC/HEIF support is not enabled (build with the `heic` feature)",
        ))
    }
}

/// Returns the HEIF decoder this build supports.
pub fn default_heif_decoder() -> Box<dyn HeifDecoder> {
    #[cfg(feature = "heic")]
    {
        Box::new(LibHeifDecoder)
    }
    #[cfg(not(feature = "heic"))]
    {
        Box::new(UnsupportedHeifDecoder)
    }
}

/// Turns an uploaded blob into something safe to send to the model.
pub struct ImageNormalizer {
    decoder: Box<dyn HeifDecoder>,
    max_size: Option<usize>,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageNormalizer")
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl ImageNormalizer {
    /// Creates a normalizer with the build's default HEIF decoder and no
    /// compression.
    pub fn new() -> Self {
        Self {
            decoder: default_heif_decoder(),
            max_size: None,
        }
    }

    /// Replaces the HEIF decoder.
    pub fn with_decoder(mut self, decoder: Box<dyn HeifDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Compresses images larger than `bytes` before they are sent.
    pub fn with_max_size(mut self, bytes: usize) -> Self {
        self.max_size = Some(bytes);
        self
    }

    /// Returns the configured compression target, if any.
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Normalizes `blob`: HEIC becomes JPEG, anything else must already be a
    /// web-safe raster, and oversized output is compressed.
    pub fn normalize(&self, blob: ImageBlob) -> Result<ImageBlob> {
        let blob = if blob.is_heif() {
            tracing::debug!(filename = %blob.filename, "converting HEIC/HEIF upload to JPEG");
            self.convert_heif(&blob)?
        } else {
            let format = blob.require_web_safe()?;
            ImageBlob {
                mime_type: format.mime_type().to_string(),
                ..blob
            }
        };

        match self.max_size {
            Some(limit) if blob.size() > limit => compress(blob, limit),
            _ => Ok(blob),
        }
    }

    fn convert_heif(&self, blob: &ImageBlob) -> Result<ImageBlob> {
        let pixels = self.decoder.decode(&blob.data).map_err(|e| match e {
            PlantIdError::Conversion { .. } => e,
            other => PlantIdError::conversion_with("HEIC/HEIF decode failed", other),
        })?;
        let data = encode_jpeg(&pixels, HEIC_JPEG_QUALITY)?;
        tracing::debug!(bytes = data.len(), "converted HEIC to JPEG");
        Ok(ImageBlob::new(
            data,
            ImageFormat::Jpeg.mime_type(),
            CONVERTED_FILENAME,
        ))
    }
}

/// Re-encodes `blob` as JPEG, stepping quality down and then halving the
/// dimensions until it fits in `limit` bytes.
fn compress(blob: ImageBlob, limit: usize) -> Result<ImageBlob> {
    let original_size = blob.size();
    let mut pixels = image::load_from_memory(&blob.data)
        .map_err(|e| PlantIdError::conversion_with("failed to decode image for compression", e))?;

    loop {
        for &quality in COMPRESSION_QUALITIES {
            let data = encode_jpeg(&pixels, quality)?;
            if data.len() <= limit {
                tracing::debug!(
                    original_size,
                    compressed_size = data.len(),
                    quality,
                    width = pixels.width(),
                    height = pixels.height(),
                    "compressed image"
                );
                return Ok(ImageBlob::new(
                    data,
                    ImageFormat::Jpeg.mime_type(),
                    jpeg_filename(&blob.filename),
                ));
            }
        }

        let (width, height) = (pixels.width() / 2, pixels.height() / 2);
        if width.min(height) < MIN_COMPRESSED_DIMENSION {
            return Err(PlantIdError::conversion(format!(
                "could not compress {original_size} bytes below {limit} bytes"
            )));
        }
        pixels = pixels.resize(width, height, FilterType::Triangle);
    }
}

fn encode_jpeg(pixels: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = pixels.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| PlantIdError::conversion_with("JPEG encoding failed", e))?;
    Ok(out)
}

fn jpeg_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => {
            format!("{stem}.{}", ImageFormat::Jpeg.extension())
        }
        _ => format!("{filename}.{}", ImageFormat::Jpeg.extension()),
    }
}

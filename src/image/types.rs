//! Core types for uploaded plant images.

use crate::error::{PlantIdError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ISO-BMFF brands that mark a HEIF/HEIC container.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1", b"heif",
];

/// Image formats the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
    /// GIF format.
    Gif,
    /// HEIC/HEIF container, as produced by phone cameras.
    Heif,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Heif => "heic",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Heif => "image/heic",
        }
    }

    /// True for raster formats every browser and the model accept as-is.
    pub fn is_web_safe(&self) -> bool {
        !matches!(self, Self::Heif)
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "heic" | "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Attempts to detect format from a declared MIME type.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_lowercase();
        if mime.contains("heic") || mime.contains("heif") {
            return Some(Self::Heif);
        }
        match mime.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        // HEIF: ....ftyp<brand>
        if &data[4..8] == b"ftyp" && HEIF_BRANDS.iter().any(|b| &data[8..12] == *b) {
            return Some(Self::Heif);
        }

        None
    }
}

/// An image as handed over by the capture/upload layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    /// Raw file bytes.
    pub data: Vec<u8>,
    /// MIME type declared by the uploader (may be empty or wrong).
    pub mime_type: String,
    /// Original filename.
    pub filename: String,
}

impl ImageBlob {
    /// Creates a blob from bytes plus the uploader's declared type and name.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }

    /// Reads a blob from disk, guessing the declared type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|f| f.mime_type().to_string())
            .unwrap_or_default();

        Ok(Self::new(data, mime_type, filename))
    }

    /// True when the declared type, filename, or content marks a HEIC/HEIF image.
    pub fn is_heif(&self) -> bool {
        let by_extension = Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension);
        [
            ImageFormat::from_mime_type(&self.mime_type),
            by_extension,
            self.detected_format(),
        ]
        .contains(&Some(ImageFormat::Heif))
    }

    /// Returns the actual format detected from magic bytes.
    pub fn detected_format(&self) -> Option<ImageFormat> {
        ImageFormat::from_magic_bytes(&self.data)
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the image as a data URL, suitable for `PlantInfo::image_url`.
    pub fn to_data_url(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }

    /// Fails unless the content is a web-safe raster format.
    pub(crate) fn require_web_safe(&self) -> Result<ImageFormat> {
        match self.detected_format() {
            Some(format) if format.is_web_safe() => Ok(format),
            Some(format) => Err(PlantIdError::conversion(format!(
                "{} is not a web-safe format",
                format.mime_type()
            ))),
            None => Err(PlantIdError::conversion(format!(
                "unrecognized image data in '{}'",
                self.filename
            ))),
        }
    }
}

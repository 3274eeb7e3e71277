//! Base64 payload exchanged between the client and the relay.

use crate::error::{PlantIdError, Result};
use crate::image::types::ImageBlob;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An image ready for transmission: `{fileType, base64Image}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    /// MIME type of the encoded bytes.
    pub file_type: String,
    /// Standard base64 of the image bytes, without a data-URL prefix.
    pub base64_image: String,
}

impl EncodedImage {
    /// Encodes a normalized blob.
    pub fn encode(blob: &ImageBlob) -> Self {
        Self {
            file_type: blob.mime_type.clone(),
            base64_image: base64::engine::general_purpose::STANDARD.encode(&blob.data),
        }
    }

    /// Builds a payload from parts received over the wire, dropping any
    /// `data:<mime>;base64,` prefix and embedded whitespace.
    pub fn from_wire(file_type: impl Into<String>, base64_image: &str) -> Self {
        Self {
            file_type: file_type.into(),
            base64_image: strip_data_url(base64_image)
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect(),
        }
    }

    /// Decodes back to the original bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64_lenient(&self.base64_image)
            .map_err(|e| PlantIdError::InvalidRequest(format!("invalid base64 image: {e}")))
    }

    /// Length of the base64 text in bytes.
    pub fn encoded_len(&self) -> usize {
        self.base64_image.len()
    }

    /// Hex SHA-256 of the payload, used to correlate log lines for one image.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.file_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.base64_image.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn strip_data_url(input: &str) -> &str {
    match input.find(";base64,") {
        Some(pos) if input.starts_with("data:") => &input[pos + 8..],
        _ => input,
    }
}

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Browsers and hand-written clients send base64 with issues a strict
/// decoder rejects:
/// - Data URI prefix (`data:image/png;base64,...`)
/// - Missing padding (`=` characters)
/// - Embedded whitespace or newlines
fn decode_base64_lenient(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let cleaned: String = strip_data_url(input)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(cleaned.trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_reproduces_bytes() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let blob = ImageBlob::new(bytes.clone(), "image/jpeg", "a.jpg");

        let encoded = EncodedImage::encode(&blob);
        assert_eq!(encoded.file_type, "image/jpeg");
        assert_eq!(encoded.decode().unwrap(), bytes);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let encoded = EncodedImage::encode(&ImageBlob::new(vec![1, 2, 3], "image/png", "a.png"));
        let json = serde_json::to_value(&encoded).unwrap();
        assert_eq!(json["fileType"], "image/png");
        assert_eq!(json["base64Image"], "AQID");
    }

    #[test]
    fn test_from_wire_strips_prefix_and_whitespace() {
        let encoded = EncodedImage::from_wire("image/png", "data:image/png;base64,AQ\nID");
        assert_eq!(encoded.base64_image, "AQID");
        assert_eq!(encoded.decode().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_without_padding() {
        let encoded = EncodedImage::from_wire("image/png", "AQI");
        assert_eq!(encoded.decode().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_decode_garbage_is_invalid_request() {
        let encoded = EncodedImage::from_wire("image/png", "!!!not base64!!!");
        assert!(matches!(
            encoded.decode(),
            Err(PlantIdError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_content_hash_is_stable_and_distinct() {
        let a = EncodedImage::from_wire("image/png", "AQID");
        let b = EncodedImage::from_wire("image/jpeg", "AQID");
        assert_eq!(a.content_hash(), a.clone().content_hash());
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }
}

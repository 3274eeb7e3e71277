//! Image intake: format detection, normalization, and encoding.

mod encode;
mod normalize;
mod types;

pub use encode::EncodedImage;
#[cfg(feature = "heic")]
pub use normalize::LibHeifDecoder;
#[cfg(not(feature = "heic"))]
pub use normalize::UnsupportedHeifDecoder;
pub use normalize::{
    default_heif_decoder, HeifDecoder, ImageNormalizer, CONVERTED_FILENAME, HEIC_JPEG_QUALITY,
};
pub use types::{ImageBlob, ImageFormat};

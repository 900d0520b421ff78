//! Image encode/decode and data-URL helpers

use base64::{engine::general_purpose, Engine as _};
use image::{codecs::jpeg::JpegEncoder, RgbImage};

use crate::error::VisionError;

/// Upper bound on an encoded client payload (base64 text)
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Decode a `data:image/<fmt>;base64,<...>` URL (or bare base64) into an RGB image
pub fn decode_data_url(payload: &str) -> Result<RgbImage, VisionError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(VisionError::Decode("empty payload".to_string()));
    }
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(VisionError::Decode(format!(
            "payload too large ({} bytes, max {})",
            payload.len(),
            MAX_PAYLOAD_BYTES
        )));
    }

    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| VisionError::Decode("data URL missing ',' separator".to_string()))?;
            if !header.starts_with("image/") {
                return Err(VisionError::Decode(format!("unsupported media type '{}'", header)));
            }
            if !header.ends_with(";base64") {
                return Err(VisionError::Decode("data URL is not base64-encoded".to_string()));
            }
            data
        }
        None => payload,
    };

    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| VisionError::Decode(format!("invalid base64: {}", e)))?;

    decode_image_bytes(&bytes)
}

/// Decode encoded image bytes (any format the image crate recognizes)
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::Decode("empty image".to_string()));
    }
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgb8())
}

/// Encode an RGB image as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, VisionError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buffer)
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Encode as JPEG and wrap in a `data:image/jpeg;base64,` URL
pub fn encode_jpeg_data_url(image: &RgbImage, quality: u8) -> Result<String, VisionError> {
    let jpeg = encode_jpeg(image, quality)?;
    Ok(to_data_url("image/jpeg", &jpeg))
}

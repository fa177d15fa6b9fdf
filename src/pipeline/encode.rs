//! Image post-processing: data URIs, dimension probing, alpha flattening.
//!
//! Extracted pictures are handed to consumers that embed them in HTML or
//! print them. Printers and several PDF writers render a transparent PNG
//! with a black background, so [`flatten_alpha`] composites onto white
//! before the image leaves the engine. JPEG has no alpha channel and is
//! never re-encoded.

use crate::error::ScrubError;
use crate::output::{ExtractedImage, ImageInfo, ImageMime};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// `data:<mime>;base64,<payload>` for inline embedding.
pub fn to_data_uri(image: &ExtractedImage) -> String {
    format!("data:{};base64,{}", image.mime(), STANDARD.encode(image.bytes()))
}

/// Decode just far enough to report size and alpha.
pub fn probe(image: &ExtractedImage) -> Result<ImageInfo, ScrubError> {
    let decoded = decode(image)?;
    Ok(ImageInfo {
        width: decoded.width(),
        height: decoded.height(),
        has_alpha: decoded.color().has_alpha(),
    })
}

/// Composite an image with alpha onto white and re-encode it as PNG.
///
/// JPEG and opaque images are returned unchanged.
pub fn flatten_alpha(image: &ExtractedImage) -> Result<ExtractedImage, ScrubError> {
    if image.mime() == ImageMime::Jpeg {
        return Ok(image.clone());
    }
    let decoded = decode(image)?;
    if !decoded.color().has_alpha() {
        return Ok(image.clone());
    }

    let rgba = decoded.to_rgba8();
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    });

    let mut buf = Vec::new();
    flat.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ScrubError::ImageDecode(e.to_string()))?;
    debug!(
        "Flattened {}x{} image: {} → {} bytes",
        flat.width(),
        flat.height(),
        image.len(),
        buf.len()
    );

    ExtractedImage::from_bytes(buf)
        .ok_or_else(|| ScrubError::Internal("PNG encoder produced no signature".into()))
}

fn decode(image: &ExtractedImage) -> Result<DynamicImage, ScrubError> {
    image::load_from_memory(image.bytes()).map_err(|e| ScrubError::ImageDecode(e.to_string()))
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u16::from(channel);
    let a = u16::from(alpha);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

//! Size reduction: re-encode oversized raster images as JPEG.
//!
//! Payloads already within budget are stored byte-for-byte. Larger ones are
//! decoded, flattened onto white when they carry alpha (JPEG has no
//! transparency), then encoded at quality 85, 80, … 25 until one fits. If
//! nothing fits the quality-25 encoding is kept. Anything that fails to
//! decode is stored unchanged: a big but valid file beats a failed download.
//!
//! The work is CPU-bound; callers on the async runtime wrap [`reduce`] in
//! `spawn_blocking`.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use tracing::{debug, warn};

/// Highest JPEG quality tried.
pub const START_QUALITY: u8 = 85;
/// Lowest JPEG quality tried; its encoding is kept when nothing fits.
pub const MIN_QUALITY: u8 = 25;
/// Quality decrement between attempts.
pub const QUALITY_STEP: u8 = 5;

/// Outcome of [`reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduced {
    /// Bytes to store.
    pub bytes: Vec<u8>,
    /// JPEG quality used, or `None` when the input was kept as-is.
    pub quality: Option<u8>,
}

impl Reduced {
    fn unchanged(payload: &[u8]) -> Self {
        Self {
            bytes: payload.to_vec(),
            quality: None,
        }
    }
}

/// Fit `payload` into `max_bytes` if it is a decodable raster image.
pub fn reduce(payload: &[u8], max_bytes: usize) -> Reduced {
    if payload.len() <= max_bytes {
        return Reduced::unchanged(payload);
    }

    let img = match image::load_from_memory(payload) {
        Ok(img) => img,
        Err(e) => {
            warn!("Image decode failed ({e}); keeping original {} bytes", payload.len());
            return Reduced::unchanged(payload);
        }
    };

    let rgb = flatten_onto_white(&img);

    let mut last: Option<(Vec<u8>, u8)> = None;
    for quality in (MIN_QUALITY..=START_QUALITY).rev().step_by(QUALITY_STEP as usize) {
        let encoded = match encode_jpeg(&rgb, quality) {
            Ok(buf) => buf,
            Err(e) => {
                warn!("JPEG encode at quality {quality} failed ({e}); keeping original");
                return Reduced::unchanged(payload);
            }
        };
        if encoded.len() <= max_bytes {
            debug!(
                "Recompressed {} → {} bytes at quality {}",
                payload.len(),
                encoded.len(),
                quality
            );
            return Reduced {
                bytes: encoded,
                quality: Some(quality),
            };
        }
        last = Some((encoded, quality));
    }

    match last {
        Some((bytes, quality)) => {
            debug!(
                "Budget of {} bytes not reachable; storing {} bytes at quality {}",
                max_bytes,
                bytes.len(),
                quality
            );
            Reduced {
                bytes,
                quality: Some(quality),
            }
        }
        None => Reduced::unchanged(payload),
    }
}

/// Composite the image over an opaque white background.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

//! Image decoding and per-tier preparation
//!
//! Uploaded bytes are sniffed with `infer` before decoding so that a PDF or
//! a text file is rejected with a clear message instead of a decoder error.

use crate::error::{Result, ScanError};
use crate::types::{ProcessingTier, TierProfile};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::io::Cursor;

/// Contrast gain for the standard and enhanced tiers
const CONTRAST_GAIN: f32 = 1.1;

/// Sharpness gain for the enhanced tier
const SHARPNESS_GAIN: f32 = 1.2;

/// JPEG quality used for vision uploads at a tier
pub fn jpeg_quality(tier: ProcessingTier) -> u8 {
    match tier {
        ProcessingTier::Fast => 85,
        ProcessingTier::Standard | ProcessingTier::Enhanced => 90,
    }
}

fn invalid(context: &str, err: image::ImageError) -> ScanError {
    ScanError::InvalidImage(format!("{}: {}", context, err))
}

/// Decode an uploaded photo into an RGB pixel buffer
///
/// The EXIF orientation, when present, is applied so the card is upright
/// the way the camera showed it.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(ScanError::InvalidImage("empty image data".into()));
    }

    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {}
        Some(kind) => {
            return Err(ScanError::InvalidImage(format!(
                "unsupported content type {}",
                kind.mime_type()
            )))
        }
        None => return Err(ScanError::InvalidImage("unrecognized image format".into())),
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanError::InvalidImage(format!("decode failed: {}", e)))?
        .into_decoder()
        .map_err(|e| invalid("decode failed", e))?;
    let orientation = decoder.orientation().map_err(|e| invalid("decode failed", e))?;
    let mut frame = DynamicImage::from_decoder(decoder).map_err(|e| invalid("decode failed", e))?;
    frame.apply_orientation(orientation);
    let decoded = frame.to_rgb8();

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ScanError::InvalidImage("image has zero size".into()));
    }

    Ok(decoded)
}

/// Stretch channel values away from the mean grey level by `gain`
fn boost_contrast(image: &RgbImage, gain: f32) -> RgbImage {
    let pixels = (image.width() as u64 * image.height() as u64).max(1);
    let sum: u64 = image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (299 * r as u64 + 587 * g as u64 + 114 * b as u64) / 1000
        })
        .sum();
    let mean = sum as f32 / pixels as f32;

    let mut out = image.clone();
    for p in out.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = (mean + (*c as f32 - mean) * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Push each pixel away from its blurred neighbourhood by `gain`
fn sharpen(image: &RgbImage, gain: f32) -> RgbImage {
    let smooth = imageops::blur(image, 1.0);
    let mut out = image.clone();
    for (p, s) in out.pixels_mut().zip(smooth.pixels()) {
        for (c, sc) in p.0.iter_mut().zip(s.0) {
            let v = sc as f32 + (*c as f32 - sc as f32) * gain;
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Downscale to the tier's longest side (never upscale), enhance, and
/// encode as JPEG
///
/// Standard and enhanced frames get a slight contrast boost; enhanced
/// frames are also sharpened.
pub fn prepare_for_tier(image: &RgbImage, profile: &TierProfile) -> Result<Vec<u8>> {
    let longest = image.width().max(image.height());
    let mut frame = if longest > profile.max_dimension {
        imageops::resize(
            image,
            scaled_side(image.width(), longest, profile.max_dimension),
            scaled_side(image.height(), longest, profile.max_dimension),
            FilterType::Lanczos3,
        )
    } else {
        image.clone()
    };

    if profile.tier != ProcessingTier::Fast {
        frame = boost_contrast(&frame, CONTRAST_GAIN);
    }
    if profile.tier == ProcessingTier::Enhanced {
        frame = sharpen(&frame, SHARPNESS_GAIN);
    }

    let quality = jpeg_quality(profile.tier);
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    DynamicImage::ImageRgb8(frame.clone())
        .write_with_encoder(encoder)
        .map_err(|e| invalid("JPEG encode failed", e))?;

    tracing::debug!(
        tier = %profile.tier,
        width = frame.width(),
        height = frame.height(),
        quality,
        bytes = buf.len(),
        "Prepared image for vision call"
    );

    Ok(buf)
}

fn scaled_side(side: u32, longest: u32, target: u32) -> u32 {
    ((side as u64 * target as u64 + longest as u64 / 2) / longest as u64).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierTable;
    use image::{ImageFormat, Rgb};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 200]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_png() {
        let img = decode_image(&png_bytes(40, 30)).unwrap();
        assert_eq!(img.dimensions(), (40, 30));
    }

    #[test]
    fn test_empty_bytes_rejected() {
        assert!(matches!(decode_image(&[]), Err(ScanError::InvalidImage(_))));
    }

    #[test]
    fn test_non_image_rejected() {
        let pdf = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n1 0 obj\n";
        let err = decode_image(pdf).unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn test_prepare_downscales_to_tier() {
        let img = RgbImage::from_pixel(2000, 1000, Rgb([10, 20, 30]));
        let profile = TierTable::default().profile(ProcessingTier::Fast);
        let jpeg = prepare_for_tier(&img, &profile).unwrap();

        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(back.width(), 512);
        assert_eq!(back.height(), 256);
    }

    #[test]
    fn test_prepare_never_upscales() {
        let img = RgbImage::from_pixel(300, 200, Rgb([10, 20, 30]));
        let profile = TierTable::default().profile(ProcessingTier::Enhanced);
        let jpeg = prepare_for_tier(&img, &profile).unwrap();

        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((back.width(), back.height()), (300, 200));
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 255) / width.max(1)) as u8;
            Rgb([v, ((y * 255) / height.max(1)) as u8, 128])
        })
    }

    /// Baseline JPEG with an APP1 Exif segment carrying one orientation tag
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
        let mut plain = Vec::new();
        DynamicImage::ImageRgb8(gradient(width, height))
            .write_to(&mut Cursor::new(&mut plain), ImageFormat::Jpeg)
            .unwrap();

        let mut payload = b"Exif\0\0II\x2a\0\x08\0\0\0".to_vec();
        payload.extend_from_slice(&[0x01, 0x00]);
        payload.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(&[orientation, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let length = (payload.len() + 2) as u16;
        let mut bytes = plain[..2].to_vec();
        bytes.extend_from_slice(&[0xFF, 0xE1]);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(&plain[2..]);
        bytes
    }

    #[test]
    fn test_decode_applies_exif_rotation() {
        let img = decode_image(&jpeg_with_orientation(40, 20, 6)).unwrap();
        assert_eq!(img.dimensions(), (20, 40));

        let upright = decode_image(&jpeg_with_orientation(40, 20, 1)).unwrap();
        assert_eq!(upright.dimensions(), (40, 20));
    }

    #[test]
    fn test_quality_per_tier() {
        assert_eq!(jpeg_quality(ProcessingTier::Fast), 85);
        assert_eq!(jpeg_quality(ProcessingTier::Standard), 90);
        assert_eq!(jpeg_quality(ProcessingTier::Enhanced), 90);
    }

    #[test]
    fn test_contrast_spreads_from_mean() {
        let img = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([100, 100, 100])
            } else {
                Rgb([150, 150, 150])
            }
        });
        let out = boost_contrast(&img, CONTRAST_GAIN);
        assert!(out.get_pixel(0, 0)[0] < 100);
        assert!(out.get_pixel(9, 0)[0] > 150);

        let flat = RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]));
        assert_eq!(boost_contrast(&flat, CONTRAST_GAIN), flat);
    }

    #[test]
    fn test_sharpen_steepens_edges() {
        let img = RgbImage::from_fn(20, 20, |x, _| {
            if x < 10 {
                Rgb([80, 80, 80])
            } else {
                Rgb([180, 180, 180])
            }
        });
        let out = sharpen(&img, SHARPNESS_GAIN);
        assert!(out.get_pixel(9, 10)[0] < 80);
        assert!(out.get_pixel(10, 10)[0] > 180);
        assert_eq!(out.get_pixel(0, 10)[0], 80);
    }

    #[test]
    fn test_tiers_prepare_different_frames() {
        let img = RgbImage::from_fn(300, 200, |x, y| {
            let v = ((x * 7919 + y * 104_729) % 97) as u8;
            Rgb([60 + v, 90 + v / 2, 40 + v])
        });
        let table = TierTable::default();
        let fast = prepare_for_tier(&img, &table.profile(ProcessingTier::Fast)).unwrap();
        let standard = prepare_for_tier(&img, &table.profile(ProcessingTier::Standard)).unwrap();
        let enhanced = prepare_for_tier(&img, &table.profile(ProcessingTier::Enhanced)).unwrap();

        assert_ne!(fast, standard);
        assert_ne!(standard, enhanced);
        for jpeg in [&fast, &standard, &enhanced] {
            let back = image::load_from_memory(jpeg).unwrap();
            assert_eq!((back.width(), back.height()), (300, 200));
        }
    }
}

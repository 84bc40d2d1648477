//! Frame fingerprint extraction
//!
//! A fingerprint is a square, fixed-size, contrast-normalized grayscale
//! sample of the region where the student's face is expected. It is a
//! visual signature for similarity comparison, not a hash.

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Share of the shorter image side covered by the fallback crop
const FALLBACK_CROP_RATIO: f64 = 0.6;

/// Pixel rectangle within the source frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
}

impl Region {
    /// Centered square covering 60% of the shorter side, biased upward
    /// (top gap is a third of the vertical slack) where faces usually sit.
    pub fn fallback(image_width: u32, image_height: u32) -> Self {
        let shorter = image_width.min(image_height);
        let side = ((shorter as f64 * FALLBACK_CROP_RATIO).round() as u32).clamp(1, shorter.max(1));
        Self {
            x: (image_width - side) / 2,
            y: (image_height - side) / 3,
            width: side,
            height: side,
        }
    }

    /// Grow by `margin` of the region's size on each side, clamp to the
    /// image, then square off to the shorter resulting edge.
    pub fn expand_square(&self, margin: f64, image_width: u32, image_height: u32) -> Self {
        let mx = (self.width as f64 * margin).round() as i64;
        let my = (self.height as f64 * margin).round() as i64;

        let x0 = (self.x as i64 - mx).max(0);
        let y0 = (self.y as i64 - my).max(0);
        let x1 = (self.x as i64 + self.width as i64 + mx).min(image_width as i64);
        let y1 = (self.y as i64 + self.height as i64 + my).min(image_height as i64);
        let side = (x1 - x0).min(y1 - y0).max(1) as u32;

        Self {
            x: x0 as u32,
            y: y0 as u32,
            width: side,
            height: side,
        }
    }
}

/// Locates the face region in a frame
///
/// Face detection is an external capability; implementations return
/// `None` when nothing is found and the fallback crop is used instead.
pub trait RegionLocator: Send + Sync {
    fn locate(&self, frame: &GrayImage) -> Option<Region>;
}

/// Locator that never detects anything, so every frame uses the fallback crop
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterCropLocator;

impl RegionLocator for CenterCropLocator {
    fn locate(&self, _frame: &GrayImage) -> Option<Region> {
        None
    }
}

/// Normalized grayscale sample of one frame
#[derive(Debug, Clone)]
pub struct FrameFingerprint {
    sample: GrayImage,
    region: Region,
}

impl FrameFingerprint {
    pub fn sample(&self) -> &GrayImage {
        &self.sample
    }

    /// Where in the source frame the sample was taken
    pub fn region(&self) -> Region {
        self.region
    }
}

/// Turns encoded frames into fingerprints
#[derive(Clone)]
pub struct FingerprintExtractor {
    locator: Arc<dyn RegionLocator>,
    size: u32,
    margin: f64,
}

impl FingerprintExtractor {
    pub fn new(locator: Arc<dyn RegionLocator>, size: u32, margin: f64) -> Self {
        Self {
            locator,
            size,
            margin,
        }
    }

    /// Decode, crop, grayscale, resize and normalize one frame
    ///
    /// Fails with `InvalidFrame` when the bytes are not a decodable image
    /// or the image has no pixels.
    pub fn extract(&self, frame: &[u8]) -> Result<FrameFingerprint> {
        let decoded = image::load_from_memory(frame)
            .map_err(|e| Error::InvalidFrame(format!("cannot decode frame: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(Error::InvalidFrame(format!(
                "frame has no pixels ({}x{})",
                width, height
            )));
        }

        let gray = decoded.to_luma8();
        let located = self
            .locator
            .locate(&gray)
            .filter(|r| r.width > 0 && r.height > 0 && r.x < width && r.y < height)
            .unwrap_or_else(|| Region::fallback(width, height));
        let region = located.expand_square(self.margin, width, height);

        let crop = imageops::crop_imm(&gray, region.x, region.y, region.width, region.height).to_image();
        let mut sample = imageops::resize(&crop, self.size, self.size, FilterType::Triangle);
        normalize_contrast(&mut sample);

        Ok(FrameFingerprint { sample, region })
    }
}

/// Stretch intensities to the full 0..=255 range; flat images are left as-is
fn normalize_contrast(image: &mut GrayImage) {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if max <= min {
        return;
    }

    let range = (max - min) as f32;
    for pixel in image.pixels_mut() {
        let v = (pixel.0[0] - min) as f32 / range * 255.0;
        pixel.0[0] = v.round() as u8;
    }
}

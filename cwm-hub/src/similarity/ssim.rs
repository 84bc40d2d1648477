//! Structural similarity (SSIM) between two grayscale samples

use image::GrayImage;
use image_compare::Algorithm;

/// Mean SSIM of two samples, clamped to [0, 1]
///
/// 1.0 means identical structure. Samples of different dimensions score 0,
/// as do anti-correlated ones.
pub fn mean_ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    match image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, a, b) {
        Ok(similarity) if similarity.score.is_finite() => similarity.score.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

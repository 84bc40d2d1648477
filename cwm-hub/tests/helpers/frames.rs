//! Generated test frames

use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;

pub fn encode_png(image: &GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Pseudo-random noise; frames from different seeds are structurally unrelated
pub fn noise_frame(seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(0x9E37_79B9);
    let image = GrayImage::from_fn(64, 48, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Luma([(state >> 24) as u8])
    });
    encode_png(&image)
}

/// Bright disc on a textured background
pub fn face_frame() -> Vec<u8> {
    let image = GrayImage::from_fn(80, 60, |x, y| {
        let dx = x as i32 - 40;
        let dy = y as i32 - 24;
        Luma([if dx * dx + dy * dy < 200 {
            220
        } else {
            ((x + 2 * y) % 120) as u8
        }])
    });
    encode_png(&image)
}

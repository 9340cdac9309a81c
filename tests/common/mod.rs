//! Shared helpers for the integration tests.

#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use image_squeezer::{Codec, CompressError, OutputFormat, Result};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

pub const KB: u64 = 1024;

/// Size model: `(quality, width, height) -> encoded bytes`.
pub type SizeModel = fn(u8, u32, u32) -> u64;

/// Codec with synthetic sizes.
///
/// Decoding ignores pixel content: a blob of `n` bytes decodes to an RGB
/// image `n / 1024` pixels wide and [`STUB_HEIGHT`] tall, so file size alone
/// selects the behaviour of a test file. Blobs starting with `BAD` fail to
/// decode. Encoding returns zero bytes of the length the model gives.
pub struct StubCodec {
    model: SizeModel,
    pub encodes: Mutex<Vec<(u8, u32, u32)>>,
}

pub const STUB_HEIGHT: u32 = 64;

impl StubCodec {
    pub fn new(model: SizeModel) -> Self {
        Self {
            model,
            encodes: Mutex::new(Vec::new()),
        }
    }

    pub fn encodes(&self) -> Vec<(u8, u32, u32)> {
        self.encodes.lock().unwrap().clone()
    }
}

impl Codec for StubCodec {
    fn encode(&self, image: &DynamicImage, _format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = (image.width(), image.height());
        self.encodes.lock().unwrap().push((quality, width, height));
        Ok(vec![0; (self.model)(quality, width, height) as usize])
    }

    fn decode(&self, data: &[u8]) -> Result<(DynamicImage, Option<OutputFormat>)> {
        if data.starts_with(b"BAD") {
            return Err(CompressError::Decode("corrupt test blob".into()));
        }
        let width = (data.len() as u64 / KB).max(1) as u32;
        let image = RgbImage::from_pixel(width, STUB_HEIGHT, Rgb([128, 64, 32]));
        Ok((DynamicImage::ImageRgb8(image), Some(OutputFormat::Jpeg)))
    }
}

/// Models used by the overview scenario (target 200KB, threshold 300KB, q 20..=95).
///
/// * 500 px wide ("file B", 500KB): 150KB at q20 rising linearly to 600KB at q95.
/// * anything else ("file C", 1MB): 220KB at q20, 900KB above, scaled by pixel count.
pub fn scenario_model(quality: u8, width: u32, height: u32) -> u64 {
    if width == 500 {
        let t = (quality as f64 - 20.0) / 75.0;
        return ((150.0 + t * 450.0) * KB as f64).round() as u64;
    }
    let base = if quality == 20 { 220 * KB } else { 900 * KB };
    let pixels = width as f64 * height as f64;
    (base as f64 * pixels / (1024.0 * STUB_HEIGHT as f64)).round() as u64
}

pub fn write_blob(path: &Path, len: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![7u8; len as usize]).unwrap();
}

/// Deterministic noise, which JPEG cannot compress well.
pub fn noise_image(width: u32, height: u32) -> DynamicImage {
    let mut seed = 0x9e37_79b9_u32;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let [r, g, b, _] = seed.to_le_bytes();
        Rgb([r, g, b])
    }))
}

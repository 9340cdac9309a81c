// codec.rs - Encode/measure capability used by the search

use crate::error::{CompressError, Result};
use crate::format::{EncodeParams, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::imageops::FilterType as ResizeFilter;
use image::{ColorType, DynamicImage};
use std::io::Cursor;

/// An image codec seen as a black box: pixels and parameters in, bytes out.
///
/// The search only relies on `probe` being deterministic for a given
/// `(image, format, quality)` and on sizes not growing as quality drops.
/// Neither property is checked.
pub trait Codec {
    fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>>;

    /// Size of the encoded image in bytes. Nothing is written to disk.
    fn probe(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<u64> {
        self.encode(image, format, quality)
            .map(|bytes| bytes.len() as u64)
    }

    /// Decode `data`, also reporting its container format when it is one we can write.
    fn decode(&self, data: &[u8]) -> Result<(DynamicImage, Option<OutputFormat>)> {
        let format = image::guess_format(data)
            .map_err(|e| CompressError::Decode(e.to_string()))?;
        let image = image::load_from_memory_with_format(data, format)
            .map_err(|e| CompressError::Decode(e.to_string()))?;
        Ok((image, OutputFormat::from_image_format(format)))
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, ResizeFilter::Lanczos3)
    }
}

impl<C: Codec + ?Sized> Codec for &C {
    fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        (**self).encode(image, format, quality)
    }

    fn probe(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<u64> {
        (**self).probe(image, format, quality)
    }

    fn decode(&self, data: &[u8]) -> Result<(DynamicImage, Option<OutputFormat>)> {
        (**self).decode(data)
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        (**self).resize(image, width, height)
    }
}

/// Codec backed by the `image` crate, with lossy WebP through libwebp.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut data, quality);

        match image {
            DynamicImage::ImageLuma8(gray) => {
                encoder.encode(gray, gray.width(), gray.height(), ColorType::L8)?;
            }
            other => {
                let rgb = other.to_rgb8();
                encoder.encode(&rgb, rgb.width(), rgb.height(), ColorType::Rgb8)?;
            }
        }

        Ok(data)
    }

    fn encode_png(&self, image: &DynamicImage, level: u8) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            Cursor::new(&mut data),
            png_compression(level),
            FilterType::Adaptive,
        );
        image.write_with_encoder(encoder)?;
        Ok(data)
    }

    fn encode_webp(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        // `Encoder::encode` unwraps libwebp errors; `encode_simple` reports them.
        let encoded = if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
                .encode_simple(false, quality as f32)
        } else {
            let rgb = image.to_rgb8();
            webp::Encoder::from_rgb(&rgb, rgb.width(), rgb.height())
                .encode_simple(false, quality as f32)
        };
        let memory = encoded.map_err(|e| CompressError::Encode(format!("WebP: {e:?}")))?;
        Ok(memory.to_vec())
    }

    fn encode_plain(&self, image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());

        match (format, image) {
            // The TIFF writer has no gray+alpha layout.
            (OutputFormat::Tiff, DynamicImage::ImageLumaA8(_)) => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut buffer, format.image_format())?;
            }
            _ => image.write_to(&mut buffer, format.image_format())?,
        }

        Ok(buffer.into_inner())
    }
}

impl Codec for ImageCodec {
    fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        match (format, format.encode_params(quality)) {
            (OutputFormat::Jpeg, EncodeParams::Lossy { quality }) => self.encode_jpeg(image, quality),
            (OutputFormat::WebP, EncodeParams::Lossy { quality }) => self.encode_webp(image, quality),
            (OutputFormat::Png, EncodeParams::Lossless { level }) => self.encode_png(image, level),
            (format, _) => self.encode_plain(image, format),
        }
    }
}

/// The PNG writer only exposes three effort presets.
fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

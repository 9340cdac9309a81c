// format.rs - Output formats and how quality maps onto their encoders

use crate::error::CompressError;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Highest PNG compression effort.
pub const PNG_MAX_LEVEL: u8 = 9;

/// Background used when an alpha channel has to be dropped.
pub const FLATTEN_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Tiff,
}

/// Encoder arguments derived from a quality value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeParams {
    /// Quality passed straight to a lossy encoder, `1..=100`.
    Lossy { quality: u8 },
    /// Compression effort for a lossless encoder, `0..=PNG_MAX_LEVEL`.
    Lossless { level: u8 },
    /// The encoder takes no size parameter.
    Uncompressed,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        Self::Jpeg,
        Self::Png,
        Self::WebP,
        Self::Bmp,
        Self::Tiff,
    ];

    pub fn encode_params(self, quality: u8) -> EncodeParams {
        let quality = quality.clamp(1, 100);
        match self {
            Self::Jpeg | Self::WebP => EncodeParams::Lossy { quality },
            Self::Png => EncodeParams::Lossless {
                level: png_level(quality),
            },
            Self::Bmp | Self::Tiff => EncodeParams::Uncompressed,
        }
    }

    pub fn supports_alpha(self) -> bool {
        match self {
            Self::Jpeg => false,
            Self::Png | Self::WebP | Self::Bmp | Self::Tiff => true,
        }
    }

    /// Bring `image` into a pixel layout every probe of this format accepts.
    ///
    /// Alpha is flattened onto [`FLATTEN_BACKGROUND`] for formats that cannot
    /// store it; everything else is reduced to 8-bit L, LA, RGB or RGBA.
    pub fn normalize(self, image: DynamicImage) -> DynamicImage {
        if !self.supports_alpha() {
            return match image {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
                DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
                other if other.color().has_alpha() => {
                    DynamicImage::ImageRgb8(flatten_alpha(&other.to_rgba8(), FLATTEN_BACKGROUND))
                }
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            };
        }

        match image {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_) => image,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WEBP",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            _ => Err(CompressError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// PNG effort for a quality value: lower quality asks for more effort.
pub fn png_level(quality: u8) -> u8 {
    let quality = quality.min(100) as f64;
    ((100.0 - quality) / 100.0 * PNG_MAX_LEVEL as f64).round() as u8
}

/// Composite an RGBA buffer over an opaque background.
pub fn flatten_alpha(image: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut flat = RgbImage::new(width, height);

    for (src, dst) in image.pixels().zip(flat.pixels_mut()) {
        let alpha = src[3] as u32;
        for c in 0..3 {
            let blended = src[c] as u32 * alpha + background[c] as u32 * (255 - alpha);
            dst[c] = ((blended + 127) / 255) as u8;
        }
    }

    flat
}

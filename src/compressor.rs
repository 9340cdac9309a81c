// compressor.rs - Per-file threshold check, quality search and persisted encode

use crate::codec::{Codec, ImageCodec};
use crate::config::{CompressionConfig, KB};
use crate::error::{CompressError, Result};
use crate::format::OutputFormat;
use crate::search::{scaled_dimensions, search_quality, SearchOutcome};
use image::DynamicImage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Quality reported for files left untouched.
pub const UNMODIFIED_QUALITY: u8 = 100;

/// Result of one `compress_file` call. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionOutcome {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub success: bool,
    pub skipped: bool,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Fraction of the original size removed; 0 for skipped and failed files.
    pub compression_ratio: f64,
    pub quality_used: u8,
    pub scale_factor: Option<f64>,
    pub message: String,
    pub error: Option<String>,
}

impl CompressionOutcome {
    fn skipped(input: &Path, output: &Path, original_size: u64, threshold: u64) -> Self {
        Self {
            input_path: input.to_path_buf(),
            output_path: Some(output.to_path_buf()),
            success: true,
            skipped: true,
            original_size,
            compressed_size: original_size,
            compression_ratio: 0.0,
            quality_used: UNMODIFIED_QUALITY,
            scale_factor: None,
            message: format!(
                "{:.1}KB does not exceed threshold {:.1}KB, skipped",
                to_kb(original_size),
                to_kb(threshold)
            ),
            error: None,
        }
    }

    fn compressed(
        input: &Path,
        output: &Path,
        original_size: u64,
        compressed_size: u64,
        search: &SearchOutcome,
    ) -> Self {
        let compression_ratio = if original_size == 0 {
            0.0
        } else {
            1.0 - compressed_size as f64 / original_size as f64
        };
        let mut outcome = Self {
            input_path: input.to_path_buf(),
            output_path: Some(output.to_path_buf()),
            success: true,
            skipped: false,
            original_size,
            compressed_size,
            compression_ratio,
            quality_used: search.quality,
            scale_factor: search.scale_factor,
            message: String::new(),
            error: None,
        };
        outcome.message = format!(
            "{:.1}KB -> {:.1}KB (saved {:.1}%, quality {})",
            to_kb(original_size),
            to_kb(compressed_size),
            compression_ratio * 100.0,
            search.quality
        );
        if let Some(scale) = search.scale_factor {
            outcome.message.push_str(&format!(", resized x{scale:.3}"));
        }
        outcome
    }

    fn failed(input: &Path, original_size: u64, err: &CompressError) -> Self {
        Self {
            input_path: input.to_path_buf(),
            output_path: None,
            success: false,
            skipped: false,
            original_size,
            compressed_size: 0,
            compression_ratio: 0.0,
            quality_used: 0,
            scale_factor: None,
            message: format!("Error: {err}"),
            error: Some(err.to_string()),
        }
    }

    /// Fraction of the original size removed, `1 - compressed / original`.
    pub fn compression_ratio(&self) -> f64 {
        self.compression_ratio
    }

    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// Image after mode normalization and, if needed, the resize fallback.
pub struct PreparedImage {
    pub image: DynamicImage,
    pub format: OutputFormat,
    pub search: SearchOutcome,
}

/// Applies a [`CompressionConfig`] to individual files through a [`Codec`].
pub struct Compressor<C = ImageCodec> {
    config: CompressionConfig,
    codec: C,
}

impl Compressor<ImageCodec> {
    pub fn new(config: CompressionConfig) -> Result<Self> {
        Self::with_codec(config, ImageCodec::new())
    }
}

impl<C: Codec> Compressor<C> {
    /// Fails with [`CompressError::Config`] before any file is touched.
    pub fn with_codec(config: CompressionConfig, codec: C) -> Result<Self> {
        config.validate()?;
        config.warn_if_target_not_below_threshold();
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Normalize `image` for `format` and decide quality and scale.
    pub fn prepare(&self, image: DynamicImage, format: OutputFormat) -> Result<PreparedImage> {
        let image = format.normalize(image);
        let search = search_quality(&self.codec, &image, format, &self.config)?;

        let image = match search.scale_factor {
            Some(scale) => {
                let (width, height) = scaled_dimensions(image.width(), image.height(), scale);
                debug!(scale, width, height, "resizing before final encode");
                self.codec.resize(&image, width, height)
            }
            None => image,
        };

        Ok(PreparedImage {
            image,
            format,
            search,
        })
    }

    /// Compress `input` towards the configured target.
    ///
    /// `output` defaults to overwriting `input`, `format` to the format the
    /// source was detected as. Failures are reported in the outcome.
    pub fn compress_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        format: Option<OutputFormat>,
    ) -> CompressionOutcome {
        let output = output.unwrap_or(input);

        let original_size = match fs::metadata(input) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                let err = if e.kind() == std::io::ErrorKind::NotFound {
                    CompressError::NotFound(input.to_path_buf())
                } else {
                    CompressError::Io(e)
                };
                error!(path = %input.display(), "{err}");
                return CompressionOutcome::failed(input, 0, &err);
            }
        };

        if original_size <= self.config.threshold_size {
            let outcome =
                CompressionOutcome::skipped(input, output, original_size, self.config.threshold_size);
            info!(file = %input.display(), "{}", outcome.message);
            return outcome;
        }

        match self.compress_into(input, output, original_size, format) {
            Ok(outcome) => {
                info!(file = %input.display(), "{}", outcome.message);
                outcome
            }
            Err(err) => {
                error!(file = %input.display(), "{err}");
                CompressionOutcome::failed(input, original_size, &err)
            }
        }
    }

    fn compress_into(
        &self,
        input: &Path,
        output: &Path,
        original_size: u64,
        format: Option<OutputFormat>,
    ) -> Result<CompressionOutcome> {
        let data = fs::read(input)?;
        let (image, detected) = self.codec.decode(&data)?;
        let format = format.or(detected).ok_or_else(|| {
            CompressError::UnsupportedFormat(format!(
                "cannot write {} in its source format",
                input.display()
            ))
        })?;

        let prepared = self.prepare(image, format)?;
        let bytes = self
            .codec
            .encode(&prepared.image, prepared.format, prepared.search.quality)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CompressError::write(parent, e))?;
        }
        fs::write(output, &bytes).map_err(|e| CompressError::write(output, e))?;
        let compressed_size = fs::metadata(output)
            .map_err(|e| CompressError::write(output, e))?
            .len();

        Ok(CompressionOutcome::compressed(
            input,
            output,
            original_size,
            compressed_size,
            &prepared.search,
        ))
    }
}

fn to_kb(bytes: u64) -> f64 {
    bytes as f64 / KB as f64
}

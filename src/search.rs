// search.rs - Quality search towards a target byte size, with resize fallback

use crate::codec::Codec;
use crate::config::CompressionConfig;
use crate::error::Result;
use crate::format::OutputFormat;
use image::DynamicImage;
use tracing::debug;

/// Relative half-width of the accepted size window around the target.
pub const TOLERANCE: f64 = 0.05;

/// One encode-and-measure step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub quality: u8,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    pub quality: u8,
    /// Linear downscale to apply before the final encode; only set when even
    /// `quality_min` overshoots the target.
    pub scale_factor: Option<f64>,
    pub probes: usize,
}

/// Binary search over an integer quality range for a size near `target_size`.
#[derive(Debug, Clone, Copy)]
pub struct QualitySearch {
    target_size: u64,
    quality_min: u8,
    quality_max: u8,
}

impl QualitySearch {
    pub fn new(config: &CompressionConfig) -> Self {
        Self {
            target_size: config.target_size,
            quality_min: config.quality_min,
            quality_max: config.quality_max,
        }
    }

    pub fn target_size(&self) -> u64 {
        self.target_size
    }

    /// Whether `size` is within ±[`TOLERANCE`] of the target.
    pub fn in_band(&self, size: u64) -> bool {
        let target = self.target_size as f64;
        let size = size as f64;
        size >= target * (1.0 - TOLERANCE) && size <= target * (1.0 + TOLERANCE)
    }

    /// Drive the search with `probe`, which maps a quality to an encoded size.
    ///
    /// Returns as soon as `quality_max` fits, falls back to a scale factor
    /// when `quality_min` does not, and otherwise bisects until a probe lands
    /// in the tolerance band or the interval is exhausted. On exhaustion the
    /// last examined midpoint is returned even if it overshot the target.
    pub fn run<F>(&self, mut probe: F) -> Result<SearchOutcome>
    where
        F: FnMut(u8) -> Result<u64>,
    {
        let mut probes = 0usize;
        let mut measure = |quality: u8| -> Result<ProbeResult> {
            let size = probe(quality)?;
            probes += 1;
            debug!(quality, size, target = self.target_size, "probe");
            Ok(ProbeResult { quality, size })
        };

        let at_max = measure(self.quality_max)?;
        if at_max.size <= self.target_size {
            return Ok(SearchOutcome {
                quality: self.quality_max,
                scale_factor: None,
                probes: 1,
            });
        }

        let at_min = measure(self.quality_min)?;
        if at_min.size > self.target_size {
            let scale = scale_factor(self.target_size, at_min.size);
            debug!(size = at_min.size, scale, "minimum quality still too large, resizing");
            return Ok(SearchOutcome {
                quality: self.quality_min,
                scale_factor: Some(scale),
                probes: 2,
            });
        }

        let mut low = self.quality_min;
        let mut high = self.quality_max;
        let mut best = self.quality_max;

        while low <= high {
            let mid = ((low as u16 + high as u16) / 2) as u8;
            let ProbeResult { size, .. } = measure(mid)?;

            if self.in_band(size) {
                best = mid;
                break;
            } else if size > self.target_size {
                best = mid;
                match mid.checked_sub(1) {
                    Some(next) => high = next,
                    None => break,
                }
            } else {
                best = mid;
                low = mid + 1;
            }
        }

        Ok(SearchOutcome {
            quality: best,
            scale_factor: None,
            probes,
        })
    }
}

/// Run [`QualitySearch`] against `codec`, probing `image` encoded as `format`.
pub fn search_quality<C: Codec>(
    codec: &C,
    image: &DynamicImage,
    format: OutputFormat,
    config: &CompressionConfig,
) -> Result<SearchOutcome> {
    QualitySearch::new(config).run(|quality| codec.probe(image, format, quality))
}

/// Uniform linear factor expected to bring `size_at_min` down to `target_size`.
///
/// Encoded size is taken to scale with pixel count, hence the square root.
pub fn scale_factor(target_size: u64, size_at_min: u64) -> f64 {
    if size_at_min == 0 {
        return 1.0;
    }
    let scale = (target_size as f64 / size_at_min as f64).sqrt();
    scale.clamp(f64::MIN_POSITIVE, 1.0)
}

/// Apply `scale` to both sides, rounding to whole pixels and keeping at least one.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let side = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    (side(width), side(height))
}

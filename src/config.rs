// config.rs - Size targets and quality bounds for a compression run

use crate::error::{CompressError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

pub const KB: u64 = 1024;

pub const DEFAULT_TARGET_KB: f64 = 200.0;
pub const DEFAULT_THRESHOLD_KB: f64 = 300.0;
pub const DEFAULT_QUALITY_RANGE: (u8, u8) = (20, 95);

/// Byte-level settings shared by every file of a run. Never mutated once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Desired output size in bytes.
    pub target_size: u64,
    /// Files at or below this many bytes are left untouched.
    pub threshold_size: u64,
    pub quality_min: u8,
    pub quality_max: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            target_size: kb_to_bytes(DEFAULT_TARGET_KB),
            threshold_size: kb_to_bytes(DEFAULT_THRESHOLD_KB),
            quality_min: DEFAULT_QUALITY_RANGE.0,
            quality_max: DEFAULT_QUALITY_RANGE.1,
        }
    }
}

impl CompressionConfig {
    pub fn new(target_size: u64, threshold_size: u64, quality_min: u8, quality_max: u8) -> Result<Self> {
        let config = Self {
            target_size,
            threshold_size,
            quality_min,
            quality_max,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from kilobyte figures (1 KB = 1024 bytes).
    pub fn from_kb(target_kb: f64, threshold_kb: f64, quality_range: (u8, u8)) -> Result<Self> {
        for (name, value) in [("target size", target_kb), ("threshold", threshold_kb)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CompressError::Config(format!(
                    "{name} must be a positive number of KB, got {value}"
                )));
            }
        }

        Self::new(
            kb_to_bytes(target_kb),
            kb_to_bytes(threshold_kb),
            quality_range.0,
            quality_range.1,
        )
    }

    /// Read a JSON config file written in kilobytes, see [`ConfigFile`].
    pub fn load(path: &Path) -> Result<Self> {
        ConfigFile::load(path)?.into_config()
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(CompressError::Config("target size must be positive".into()));
        }
        if self.threshold_size == 0 {
            return Err(CompressError::Config("threshold must be positive".into()));
        }
        if self.quality_min < 1 || self.quality_max > 100 || self.quality_min > self.quality_max {
            return Err(CompressError::Config(format!(
                "quality range must satisfy 1 <= min <= max <= 100, got {}..={}",
                self.quality_min, self.quality_max
            )));
        }
        Ok(())
    }

    /// Warn when the target is not below the threshold.
    ///
    /// Such a run is valid, but files between the two sizes are compressed
    /// towards a target larger than the file that triggered them.
    pub fn warn_if_target_not_below_threshold(&self) -> bool {
        let suspicious = self.target_size >= self.threshold_size;
        if suspicious {
            warn!(
                target_kb = self.target_size as f64 / KB as f64,
                threshold_kb = self.threshold_size as f64 / KB as f64,
                "target size is not below the threshold; few files may shrink"
            );
        }
        suspicious
    }

    pub fn quality_range(&self) -> (u8, u8) {
        (self.quality_min, self.quality_max)
    }
}

/// On-disk form of [`CompressionConfig`]; sizes in KB, every field optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub target_size_kb: f64,
    pub threshold_kb: f64,
    pub quality_min: u8,
    pub quality_max: u8,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            target_size_kb: DEFAULT_TARGET_KB,
            threshold_kb: DEFAULT_THRESHOLD_KB,
            quality_min: DEFAULT_QUALITY_RANGE.0,
            quality_max: DEFAULT_QUALITY_RANGE.1,
        }
    }
}

impl ConfigFile {
    /// Parse without validating, so callers can override fields first.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CompressError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| CompressError::Config(format!("{}: {e}", path.display())))
    }

    pub fn into_config(self) -> Result<CompressionConfig> {
        CompressionConfig::from_kb(
            self.target_size_kb,
            self.threshold_kb,
            (self.quality_min, self.quality_max),
        )
    }
}

pub fn kb_to_bytes(kb: f64) -> u64 {
    (kb * KB as f64).round() as u64
}

// batch.rs - Folder discovery and sequential batch compression

use crate::cancel::CancellationToken;
use crate::codec::Codec;
use crate::compressor::{CompressionOutcome, Compressor};
use crate::error::{CompressError, Result};
use crate::format::OutputFormat;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Extensions picked up during discovery, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

#[derive(Debug, Clone)]
pub struct FolderOptions {
    /// Mirror results under this directory instead of overwriting sources.
    pub output_dir: Option<PathBuf>,
    pub recursive: bool,
    pub format: Option<OutputFormat>,
    pub cancel: CancellationToken,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            recursive: true,
            format: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Outcomes in discovery order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<CompressionOutcome>,
    /// Set when the run stopped early on a cancellation request.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub compressed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Totals over compressed files only.
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub saved_bytes: i64,
    /// Mean of the per-file ratios of compressed files.
    pub average_ratio: f64,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            processed: self.outcomes.len(),
            ..BatchSummary::default()
        };

        for outcome in &self.outcomes {
            match (outcome.success, outcome.skipped) {
                (false, _) => summary.failed += 1,
                (true, true) => summary.skipped += 1,
                (true, false) => {
                    summary.compressed += 1;
                    summary.original_bytes += outcome.original_size;
                    summary.compressed_bytes += outcome.compressed_size;
                    summary.average_ratio += outcome.compression_ratio;
                }
            }
        }

        if summary.compressed > 0 {
            summary.average_ratio /= summary.compressed as f64;
        }
        summary.saved_bytes = summary.original_bytes as i64 - summary.compressed_bytes as i64;
        summary
    }
}

pub fn is_image_file(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Supported images under `root`, sorted by path.
pub fn collect_images(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(CompressError::NotFound(root.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut images = Vec::new();

    for entry in WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && is_image_file(path) {
            images.push(path.to_path_buf());
        }
    }

    Ok(images)
}

/// Where `file` (found under `root`) is written when mirroring into `output_dir`.
///
/// A forced `format` replaces the extension with the format's usual one.
pub fn output_path_for(
    root: &Path,
    file: &Path,
    output_dir: &Path,
    format: Option<OutputFormat>,
) -> PathBuf {
    let out = match file.strip_prefix(root) {
        Ok(relative) => output_dir.join(relative),
        Err(_) => output_dir.join(file.file_name().unwrap_or_default()),
    };

    match format {
        Some(format) => out.with_extension(format.extension()),
        None => out,
    }
}

impl<C: Codec> Compressor<C> {
    /// Compress every supported image under `input_dir`, one at a time.
    ///
    /// `progress` runs after each file with its 1-based index, the total,
    /// the file name and the outcome. Cancellation is only checked between
    /// files; a file already being compressed always finishes.
    pub fn compress_folder<F>(
        &self,
        input_dir: &Path,
        options: &FolderOptions,
        mut progress: F,
    ) -> Result<BatchResult>
    where
        F: FnMut(usize, usize, &str, &CompressionOutcome),
    {
        if !input_dir.exists() {
            return Err(CompressError::NotFound(input_dir.to_path_buf()));
        }

        if let Some(output_dir) = &options.output_dir {
            fs::create_dir_all(output_dir).map_err(|e| CompressError::write(output_dir, e))?;
        } else {
            warn!(dir = %input_dir.display(), "no output folder given, sources will be overwritten");
        }

        let files = collect_images(input_dir, options.recursive)?;
        let total = files.len();
        info!(dir = %input_dir.display(), total, "found images");

        let mut result = BatchResult::default();

        for (index, file) in files.iter().enumerate() {
            if options.cancel.is_cancelled() {
                info!(done = index, total, "batch cancelled");
                result.cancelled = true;
                break;
            }

            let output = options
                .output_dir
                .as_deref()
                .map(|dir| output_path_for(input_dir, file, dir, options.format));

            let outcome = self.compress_file(file, output.as_deref(), options.format);
            progress(index + 1, total, &outcome.file_name(), &outcome);
            result.outcomes.push(outcome);
        }

        Ok(result)
    }
}

/// Run [`Compressor::compress_folder`] on the blocking pool so the calling
/// task stays responsive.
pub async fn compress_folder_async<C, F>(
    compressor: Arc<Compressor<C>>,
    input_dir: PathBuf,
    options: FolderOptions,
    progress: F,
) -> Result<BatchResult>
where
    C: Codec + Send + Sync + 'static,
    F: FnMut(usize, usize, &str, &CompressionOutcome) + Send + 'static,
{
    tokio::task::spawn_blocking(move || compressor.compress_folder(&input_dir, &options, progress))
        .await
        .map_err(|e| CompressError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_supported_extensions() {
        assert!(is_image_file(Path::new("a/photo.JPG")));
        assert!(is_image_file(Path::new("scan.tiff")));
        assert!(is_image_file(Path::new("x.WebP")));
        assert!(!is_image_file(Path::new("anim.gif")));
        assert!(!is_image_file(Path::new("scan.tif")));
        assert!(!is_image_file(Path::new("README")));
    }

    #[test]
    fn output_paths_mirror_relative_layout() {
        let root = Path::new("/in");
        let out = Path::new("/out");

        assert_eq!(
            output_path_for(root, Path::new("/in/2024/trip/a.png"), out, None),
            PathBuf::from("/out/2024/trip/a.png")
        );
        assert_eq!(
            output_path_for(root, Path::new("/in/b.png"), out, Some(OutputFormat::Jpeg)),
            PathBuf::from("/out/b.jpg")
        );
        assert_eq!(
            output_path_for(root, Path::new("/in/c.jpeg"), out, Some(OutputFormat::WebP)),
            PathBuf::from("/out/c.webp")
        );
    }

    #[test]
    fn summary_counts_each_kind() {
        let make = |success, skipped, original: u64, compressed: u64| CompressionOutcome {
            input_path: PathBuf::from("f.jpg"),
            output_path: None,
            success,
            skipped,
            original_size: original,
            compressed_size: compressed,
            compression_ratio: if success && !skipped {
                1.0 - compressed as f64 / original as f64
            } else {
                0.0
            },
            quality_used: 50,
            scale_factor: None,
            message: String::new(),
            error: None,
        };
        let result = BatchResult {
            outcomes: vec![
                make(true, false, 1000, 400),
                make(true, true, 200, 200),
                make(false, false, 900, 0),
                make(true, false, 500, 300),
            ],
            cancelled: false,
        };

        let summary = result.summary();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.compressed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.original_bytes, 1500);
        assert_eq!(summary.compressed_bytes, 700);
        assert_eq!(summary.saved_bytes, 800);
        // (0.6 + 0.4) / 2; skipped and failed files do not count.
        assert!((summary.average_ratio - 0.5).abs() < 1e-12);
        assert_eq!(BatchResult::default().summary().average_ratio, 0.0);
    }

    #[test]
    fn missing_root_is_not_found() {
        assert!(matches!(
            collect_images(Path::new("/definitely/not/here"), true),
            Err(CompressError::NotFound(_))
        ));
    }
}

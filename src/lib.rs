//! Size-targeted image compression.
//!
//! Files above a size threshold are re-encoded at the highest quality whose
//! output lands near a target size, found by binary search over encode-and-
//! measure probes. When even the lowest allowed quality is too large, the
//! image is downscaled instead.

pub mod batch;
pub mod cancel;
pub mod codec;
pub mod compressor;
pub mod config;
pub mod error;
pub mod format;
pub mod search;

pub use batch::{
    collect_images, compress_folder_async, is_image_file, output_path_for, BatchResult,
    BatchSummary, FolderOptions, SUPPORTED_EXTENSIONS,
};
pub use cancel::CancellationToken;
pub use codec::{Codec, ImageCodec};
pub use compressor::{CompressionOutcome, Compressor, PreparedImage};
pub use config::{CompressionConfig, ConfigFile};
pub use error::{CompressError, Result};
pub use format::{EncodeParams, OutputFormat};
pub use search::{scale_factor, scaled_dimensions, search_quality, ProbeResult, QualitySearch, SearchOutcome};

//! File-backed blob store for source uploads and rendered results, plus the
//! ingest validation applied before any byte reaches disk.

mod local;
mod validate;

pub use local::LocalBlobs;
pub use validate::{validate_upload, ImageKind, ValidatedUpload};

use std::path::PathBuf;

/// Upper bound applied while the upload stream is buffered.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Pages narrower than this are unusable for detection.
pub const MIN_WIDTH: u32 = 100;
/// Decoded-pixel ceiling; long webtoon strips stay well under it.
pub const MAX_PIXEL_AREA: u64 = 80_000_000;
/// height:width (or the inverse) ceiling.
pub const MAX_ASPECT_RATIO: f64 = 50.0;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("file exceeds {MAX_UPLOAD_BYTES} bytes")]
    TooLarge,
    #[error("file content does not match its declared type")]
    MagicMismatch,
    #[error("image could not be read: {0}")]
    Unreadable(#[from] image::ImageError),
    #[error("image width {0}px is below the {MIN_WIDTH}px minimum")]
    TooNarrow(u32),
    #[error("image of {0} pixels exceeds the {MAX_PIXEL_AREA} pixel ceiling")]
    TooManyPixels(u64),
    #[error("image aspect ratio {0:.1} exceeds {MAX_ASPECT_RATIO}")]
    ExtremeAspect(f64),
    #[error("blob io failed")]
    Io(#[from] std::io::Error),
}

/// Storage for image blobs, addressed by paths relative to a store root.
/// Result filenames embed the translate id, so concurrent workers never
/// collide.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` as `{subdir}/{stem}{ext}` and returns that relative
    /// path. Parent directories are created as needed.
    async fn save(
        &self,
        subdir: &str,
        stem: &str,
        ext: &str,
        bytes: &[u8],
    ) -> Result<String, BlobError>;

    fn absolute_path(&self, relative: &str) -> PathBuf;

    async fn exists(&self, relative: &str) -> bool;

    async fn delete(&self, relative: &str) -> Result<bool, BlobError>;
}

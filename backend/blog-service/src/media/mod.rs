/// Media storage for post images
///
/// Uploads are verified by decoding the byte stream; the file name and the
/// declared content type are never trusted. Verified images are stored under
/// `posts/<uuid>.<ext>` through a `MediaStore`.
pub mod local;
pub mod s3;

pub use local::LocalMediaStore;
pub use s3::{S3MediaConfig, S3MediaStore};

use image::ImageFormat;
use thiserror::Error;
use uuid::Uuid;

/// Message shown when an upload is not a decodable image
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Directory (key prefix) post images live under
pub const POSTS_PREFIX: &str = "posts";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Upload(String),
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// An upload that decoded successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl VerifiedImage {
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Ico => "image/x-icon",
            _ => "application/octet-stream",
        }
    }

    /// Fresh storage key for this image
    pub fn storage_key(&self) -> String {
        format!("{}/{}.{}", POSTS_PREFIX, Uuid::new_v4(), self.extension())
    }
}

/// Decode `bytes` fully to prove they are an image
pub async fn verify_image(bytes: Vec<u8>) -> MediaResult<VerifiedImage> {
    tokio::task::spawn_blocking(move || verify_image_blocking(&bytes))
        .await
        .map_err(|e| MediaError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

fn verify_image_blocking(bytes: &[u8]) -> MediaResult<VerifiedImage> {
    if bytes.is_empty() {
        return Err(MediaError::InvalidImage("empty upload".to_string()));
    }

    let format =
        image::guess_format(bytes).map_err(|e| MediaError::InvalidImage(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| MediaError::InvalidImage(e.to_string()))?;

    Ok(VerifiedImage {
        format,
        width: decoded.width(),
        height: decoded.height(),
    })
}

/// Where verified uploads are written
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under `key`, returning the stored key
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> MediaResult<String>;

    /// Remove a stored key; a missing key is not an error
    async fn delete(&self, key: &str) -> MediaResult<()>;

    /// Public URL for a stored key
    fn url(&self, key: &str) -> String;
}

/// Join a base URL and a key with exactly one slash between them
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

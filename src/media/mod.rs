//! Product and avatar images.

pub mod cloudinary;

use async_trait::async_trait;
use thiserror::Error;

pub use cloudinary::CloudinaryStore;

pub const MAX_IMAGE_BYTES: usize = 300_000;
const ALLOWED_TYPES: [&str; 4] = ["image/jpg", "image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Image storage is not configured")]
    NotConfigured,
    #[error("Image is too large ({size} bytes, max 300000)")]
    TooLarge { size: usize },
    #[error("Unsupported image type {0}")]
    UnsupportedType(String),
    #[error("Image upload failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Image host returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.data.len() > MAX_IMAGE_BYTES {
            return Err(MediaError::TooLarge { size: self.data.len() });
        }
        let content_type = self.content_type.to_ascii_lowercase();
        if !ALLOWED_TYPES.contains(&content_type.as_str()) {
            return Err(MediaError::UnsupportedType(self.content_type.clone()));
        }
        Ok(())
    }
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the image and returns its public URL.
    async fn upload(&self, image: ImageUpload) -> Result<String, MediaError>;
}

pub struct DisabledImageStore;

#[async_trait]
impl ImageStore for DisabledImageStore {
    async fn upload(&self, _image: ImageUpload) -> Result<String, MediaError> {
        Err(MediaError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(content_type: &str, size: usize) -> ImageUpload {
        ImageUpload { filename: "a.png".into(), content_type: content_type.into(), data: vec![0; size] }
    }

    #[test]
    fn test_validate() {
        assert!(image("image/png", 10).validate().is_ok());
        assert!(image("IMAGE/JPEG", MAX_IMAGE_BYTES).validate().is_ok());
        assert!(matches!(image("image/png", MAX_IMAGE_BYTES + 1).validate(), Err(MediaError::TooLarge { .. })));
        assert!(matches!(image("image/gif", 10).validate(), Err(MediaError::UnsupportedType(_))));
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ImageStore, ImageUpload, MediaError};
use crate::config::CloudinaryConfig;

const FOLDER: &str = "repustore";

pub struct CloudinaryStore {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, config })
    }
}

/// Signature over the alphabetically sorted signed parameters followed by the secret.
pub(crate) fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
    format!("{:x}", Sha256::digest(format!("{joined}{api_secret}").as_bytes()))
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    #[tracing::instrument(skip(self, image), fields(filename = %image.filename, size = image.data.len()))]
    async fn upload(&self, image: ImageUpload) -> Result<String, MediaError> {
        image.validate()?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [("folder", FOLDER.to_string()), ("timestamp", timestamp.clone())];
        let signature = sign(&signed, &self.config.api_secret);

        let part = reqwest::multipart::Part::bytes(image.data)
            .file_name(image.filename)
            .mime_str(&image.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("folder", FOLDER)
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let url = format!("https://api.cloudinary.com/v1_1/{}/image/upload", self.config.cloud_name);
        let response = self.http.post(url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Api { status: status.as_u16(), body });
        }
        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_parameters() {
        let a = sign(&[("timestamp", "1700000000".into()), ("folder", "repustore".into())], "secret");
        let b = sign(&[("folder", "repustore".into()), ("timestamp", "1700000000".into())], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let expected = format!("{:x}", Sha256::digest(b"folder=repustore&timestamp=1700000000secret"));
        assert_eq!(a, expected);
    }
}

use crate::error::{Result, StoreError};
use crate::metrics::{self, MetricName};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(ImageKind::Png),
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/webp" => Some(ImageKind::Webp),
            "image/gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Webp => "webp",
            ImageKind::Gif => "gif",
        }
    }

    pub fn matches(&self, bytes: &[u8]) -> bool {
        match self {
            ImageKind::Png => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageKind::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            ImageKind::Webp => bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
            ImageKind::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredImage {
    pub url: String,
    pub sha256: String,
    pub bytes: usize,
}

/// Content-addressed image storage on the local filesystem.
pub struct ImageStore {
    root: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn store_image(&self, bytes: &[u8], content_type: &str) -> Result<StoredImage> {
        let kind = ImageKind::from_content_type(content_type).ok_or_else(|| {
            StoreError::UnsupportedMedia(format!(
                "'{content_type}' is not supported, use PNG, JPEG, WebP or GIF"
            ))
        })?;
        if bytes.is_empty() {
            return Err(StoreError::validation("Upload is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(StoreError::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }
        if !kind.matches(bytes) {
            return Err(StoreError::validation(format!(
                "File contents are not a valid {} image",
                kind.extension()
            )));
        }

        let hash = hex::encode(Sha256::digest(bytes));
        let relative = format!("sha256/{}/{}/{}.{}", &hash[0..2], &hash[2..4], hash, kind.extension());
        let path = self.root.join(&relative);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        if !fs::try_exists(&path).await? {
            fs::write(&path, bytes).await?;
            info!("Stored upload {} ({} bytes)", relative, bytes.len());
            metrics::increment(MetricName::UploadsStored);
            metrics::record(MetricName::UploadBytes, bytes.len() as f64);
        }

        Ok(StoredImage {
            url: format!("/uploads/{relative}"),
            sha256: hash,
            bytes: bytes.len(),
        })
    }
}

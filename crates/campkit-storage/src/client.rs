//! R2 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Part size for multipart uploads. R2 requires parts of at least 5 MiB
/// (except the last); 8 MiB keeps progress callbacks reasonably frequent.
const PART_SIZE: usize = 8 * 1024 * 1024;

/// Progress callback: (bytes completed, total bytes).
pub type UploadProgress = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL serving the bucket (custom domain or r2.dev)
    pub public_base_url: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE_URL")
                .map_err(|_| StorageError::config_error("R2_PUBLIC_BASE_URL not set"))?,
        })
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    /// Public URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Upload a local file into `folder` under `file_name`, returning the
    /// public URL.
    ///
    /// Files larger than one part are uploaded multipart, with `on_progress`
    /// called after each part as (bytes completed, total). Small files use a
    /// single PUT and one final callback. `known_size` skips a metadata stat
    /// when the caller already knows the file length.
    pub async fn upload(
        &self,
        path: impl AsRef<Path>,
        file_name: &str,
        folder: &str,
        on_progress: Option<UploadProgress>,
        known_size: Option<u64>,
    ) -> StorageResult<String> {
        let path = path.as_ref();
        let key = format!("{}/{}", folder.trim_matches('/'), file_name);
        let content_type = content_type_for(file_name);

        let total = match known_size {
            Some(size) => size,
            None => tokio::fs::metadata(path).await?.len(),
        };

        debug!("Uploading {} ({} bytes) to {}", path.display(), total, key);

        if total as usize <= PART_SIZE {
            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(body)
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;

            if let Some(cb) = &on_progress {
                cb(total, total);
            }
        } else {
            self.upload_multipart(path, &key, content_type, total, on_progress)
                .await?;
        }

        info!("Uploaded {} to {}", path.display(), key);
        Ok(self.public_url(&key))
    }

    async fn upload_multipart(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
        total: u64,
        on_progress: Option<UploadProgress>,
    ) -> StorageResult<()> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| StorageError::upload_failed("No upload ID returned"))?
            .to_string();

        let result = self
            .upload_parts(path, key, &upload_id, total, on_progress)
            .await;

        if result.is_err() {
            // Best effort: drop the partial upload so R2 does not bill for it
            let _ = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await;
        }

        result
    }

    async fn upload_parts(
        &self,
        path: &Path,
        key: &str,
        upload_id: &str,
        total: u64,
        on_progress: Option<UploadProgress>,
    ) -> StorageResult<()> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut completed_parts = Vec::new();
        let mut part_number: i32 = 1;
        let mut bytes_done: u64 = 0;

        loop {
            let mut buf = vec![0u8; PART_SIZE];
            let mut filled = 0;
            while filled < buf.len() {
                let n = file.read(&mut buf[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            buf.truncate(filled);

            let part = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buf))
                .send()
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(part.e_tag().map(String::from))
                    .build(),
            );

            bytes_done += filled as u64;
            if let Some(cb) = &on_progress {
                cb(bytes_done.min(total), total);
            }

            part_number += 1;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

/// Infer a content type from the destination file name.
pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".mp4") {
        "video/mp4"
    } else if lower.ends_with(".mov") {
        "video/quicktime"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_inference() {
        assert_eq!(content_type_for("draft.MP4"), "video/mp4");
        assert_eq!(content_type_for("raw.mov"), "video/quicktime");
        assert_eq!(content_type_for("still.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("notes.txt"), "application/octet-stream");
    }

    #[test]
    fn test_public_url_join() {
        let config = R2Config {
            endpoint_url: "https://acct.r2.cloudflarestorage.com".to_string(),
            access_key_id: "k".to_string(),
            secret_access_key: "s".to_string(),
            bucket_name: "deliverables".to_string(),
            region: "auto".to_string(),
            public_base_url: "https://cdn.example.com/".to_string(),
        };
        let client = R2Client::new(config);
        assert_eq!(
            client.public_url("camp_1/drafts/a.mp4"),
            "https://cdn.example.com/camp_1/drafts/a.mp4"
        );
    }
}

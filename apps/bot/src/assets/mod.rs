//! Uploaded images live in S3-compatible object storage.
//!
//! The remote file id handed back by `upload` is the object key; the link
//! tables in Postgres own ordering and ownership.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stores `data` and returns its remote file id.
    async fn upload(&self, data: Bytes, filename: &str, mime_type: &str)
        -> Result<String, AppError>;

    async fn fetch_bytes(&self, remote_id: &str) -> Result<Bytes, AppError>;

    /// Public URL for the web app.
    fn url_for(&self, remote_id: &str) -> String;

    async fn delete(&self, remote_id: &str) -> Result<(), AppError>;
}

pub struct S3AssetStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3AssetStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Object key for a new upload. Only the last path segment of `filename` is kept.
pub fn object_key(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("file");
    format!("assets/{}/{}", Uuid::new_v4(), name)
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, AppError> {
        let key = object_key(filename);
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("upload of {filename} failed: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, key);
        Ok(key)
    }

    async fn fetch_bytes(&self, remote_id: &str) -> Result<Bytes, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(remote_id)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("fetch of {remote_id} failed: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::S3(format!("reading {remote_id} failed: {e}")))?;
        Ok(data.into_bytes())
    }

    fn url_for(&self, remote_id: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, remote_id)
    }

    async fn delete(&self, remote_id: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(remote_id)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("delete of {remote_id} failed: {e}")))?;
        Ok(())
    }
}

//! Object storage gateway for label media
//!
//! Uploads, deletes, and prefix-purges binary media (images and audio)
//! under customer-scoped keys of the shape
//! `labels/{customerId}/{timestamp}_{index}.{ext}`.

use anyhow::Result;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use tracing::info;

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding all label media
    pub bucket: String,
    /// Public base URL the bucket's objects are served from
    pub public_base_url: String,
}

impl StorageConfig {
    /// Create a new StorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `MEDIA_BUCKET_NAME`: S3 bucket name
    /// - `MEDIA_BASE_URL`: Public base URL for stored objects
    pub fn from_env() -> Result<Self> {
        let bucket = std::env::var("MEDIA_BUCKET_NAME")
            .map_err(|_| anyhow::anyhow!("MEDIA_BUCKET_NAME environment variable not set"))?;
        let public_base_url = std::env::var("MEDIA_BASE_URL")
            .map_err(|_| anyhow::anyhow!("MEDIA_BASE_URL environment variable not set"))?;

        Ok(Self {
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Build the storage key for one media blob of a label
pub fn media_key(customer_id: i64, timestamp_millis: i64, index: usize, ext: &str) -> String {
    format!("labels/{customer_id}/{timestamp_millis}_{index}.{ext}")
}

/// Key prefix owning every object of one customer
pub fn customer_prefix(customer_id: i64) -> String {
    format!("labels/{customer_id}/")
}

/// Map an uploaded part's content type to a key extension
///
/// The accepted set matches the upload filter: JPEG and PNG images, MP3
/// and WAV audio.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "audio/mpeg" => Some("mp3"),
        "audio/wav" => Some("wav"),
        _ => None,
    }
}

/// Object storage gateway
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl ObjectStorage {
    /// Create a new gateway over an initialized S3 client
    pub fn new(client: Client, config: StorageConfig) -> Self {
        Self {
            client,
            bucket: config.bucket,
            public_base_url: config.public_base_url,
        }
    }

    /// Public URL for a stored key
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Recover the storage key from a stored public URL
    pub fn key_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|key| !key.is_empty())
    }

    /// Upload one media blob and return its public URL
    pub async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        Ok(self.url_for(key))
    }

    /// Delete a single object by key
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        Ok(())
    }

    /// Delete a single object addressed by its stored public URL
    pub async fn delete_url(&self, url: &str) -> Result<()> {
        match self.key_from_url(url) {
            Some(key) => self.delete(key).await,
            None => Err(anyhow::anyhow!("URL {} is outside the media base", url)),
        }
    }

    /// Delete every object under a key prefix
    ///
    /// Lists pages with continuation tokens and issues one batched delete
    /// per page. Returns the number of deleted objects.
    pub async fn purge_prefix(&self, prefix: &str) -> Result<usize> {
        info!("Purging object storage prefix: {}", prefix);

        let mut deleted = 0;
        let mut continuation_token = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await?;

            let keys: Vec<String> = response
                .contents
                .unwrap_or_default()
                .into_iter()
                .filter_map(|obj| obj.key)
                .collect();

            if !keys.is_empty() {
                let mut identifiers = Vec::with_capacity(keys.len());
                for key in &keys {
                    identifiers.push(ObjectIdentifier::builder().key(key).build()?);
                }

                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(Delete::builder().set_objects(Some(identifiers)).build()?)
                    .send()
                    .await?;

                deleted += keys.len();
            }

            if response.is_truncated.unwrap_or(false) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        info!("Purged {} objects under {}", deleted, prefix);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::BehaviorVersion;

    fn storage() -> ObjectStorage {
        let conf = aws_sdk_s3::config::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .build();
        ObjectStorage::new(
            Client::from_conf(conf),
            StorageConfig {
                bucket: "moveout-media".to_string(),
                public_base_url: "https://media.example.com".to_string(),
            },
        )
    }

    #[test]
    fn test_media_key_shape() {
        assert_eq!(
            media_key(7, 1727000000000, 0, "jpg"),
            "labels/7/1727000000000_0.jpg"
        );
        assert_eq!(customer_prefix(7), "labels/7/");
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("audio/mpeg"), Some("mp3"));
        assert_eq!(extension_for("audio/wav"), Some("wav"));
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn test_url_key_inverse() {
        let storage = storage();
        let key = media_key(3, 1727000000000, 2, "png");
        let url = storage.url_for(&key);
        assert_eq!(url, "https://media.example.com/labels/3/1727000000000_2.png");
        assert_eq!(storage.key_from_url(&url), Some(key.as_str()));
    }

    #[test]
    fn test_foreign_url_is_rejected() {
        let storage = storage();
        assert_eq!(storage.key_from_url("https://other.example.com/x.jpg"), None);
        assert_eq!(storage.key_from_url("https://media.example.com"), None);
    }
}

/// S3 media store for post images
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, error};

use super::{join_url, MediaError, MediaResult, MediaStore};

#[derive(Debug, Clone)]
pub struct S3MediaConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack)
    pub endpoint: Option<String>,
    /// Public URL prefix objects are served from (bucket URL or CDN)
    pub public_url: String,
}

#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    config: S3MediaConfig,
}

impl S3MediaStore {
    pub fn new(client: Client, config: S3MediaConfig) -> Self {
        Self { client, config }
    }

    /// Build a client from the default AWS credential chain
    pub async fn from_config(config: S3MediaConfig) -> Self {
        use aws_sdk_s3::config::Region;

        let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        // S3-compatible storage like MinIO
        if let Some(endpoint) = &config.endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;
        Self::new(Client::new(&aws_config), config)
    }
}

#[async_trait::async_trait]
impl MediaStore for S3MediaStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> MediaResult<String> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %self.config.bucket, key = %key, error = %e, "S3 upload failed");
                MediaError::Upload(format!("Failed to upload {}: {}", key, e))
            })?;

        debug!(bucket = %self.config.bucket, key = %key, size, "Uploaded media object");
        Ok(key.to_string())
    }

    async fn delete(&self, key: &str) -> MediaResult<()> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %self.config.bucket, key = %key, error = %e, "S3 delete failed");
                MediaError::Upload(format!("Failed to delete {}: {}", key, e))
            })?;

        debug!(bucket = %self.config.bucket, key = %key, "Deleted media object");
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.config.public_url, key)
    }
}

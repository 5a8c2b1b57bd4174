use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    primitives::ByteStream,
};
use tokio::sync::watch;

use crate::assets::{
    entities::{Asset, UploadProgress},
    error::{AssetError, validate_key},
    storage::AssetStorage,
};

pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3Storage {
    pub async fn new(
        bucket: String,
        region: String,
        access_key: String,
        secret_key: String,
        endpoint: Option<String>,
    ) -> Self {
        let mut config_builder = aws_config::defaults(BehaviorVersion::v2025_01_17())
            .region(Region::new(region.clone()));

        let credentials = Credentials::new(
            access_key,
            secret_key,
            None, // session token
            None, // expiry time
            "storefront-registration",
        );
        config_builder = config_builder.credentials_provider(credentials);

        // Custom endpoints (MinIO and friends)
        if let Some(endpoint_url) = &endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url.clone());
        }

        let sdk_config = config_builder.load().await;

        Self {
            client: Client::new(&sdk_config),
            bucket,
            region,
            endpoint,
        }
    }
}

#[async_trait]
impl AssetStorage for S3Storage {
    async fn put_asset(
        &self,
        key: &str,
        asset: Asset,
        progress: &watch::Sender<UploadProgress>,
    ) -> Result<(), AssetError> {
        validate_key(key)?;

        let total_bytes = asset.size();
        progress.send_replace(UploadProgress::Transferring {
            bytes_transferred: 0,
            total_bytes,
        });

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(asset.content_type)
            .body(ByteStream::from(asset.bytes))
            .send()
            .await
            .map_err(|err| AssetError::Transfer(format!("Failed to upload {}: {}", key, err)))?;

        progress.send_replace(UploadProgress::Transferring {
            bytes_transferred: total_bytes,
            total_bytes,
        });

        Ok(())
    }

    async fn fetch_asset(&self, key: &str) -> Result<Option<Asset>, AssetError> {
        validate_key(key)?;

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(AssetError::Transfer(format!(
                    "Failed to fetch {}: {}",
                    key, service_err
                )));
            }
        };

        let content_type = output
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|err| AssetError::Transfer(format!("Failed to read {}: {}", key, err)))?
            .into_bytes()
            .to_vec();

        Ok(Some(Asset::new(bytes, content_type)))
    }

    fn public_url(&self, key: &str) -> Result<String, AssetError> {
        validate_key(key)?;
        Ok(object_url(
            self.endpoint.as_deref(),
            &self.bucket,
            &self.region,
            key,
        ))
    }
}

fn object_url(endpoint: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match endpoint {
        // Path-style URL for custom endpoints
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_on_custom_endpoint_is_path_style() {
        assert_eq!(
            object_url(
                Some("http://localhost:9000/"),
                "avatars",
                "us-east-1",
                "images/u1/1-alice.png"
            ),
            "http://localhost:9000/avatars/images/u1/1-alice.png"
        );
    }

    #[test]
    fn test_object_url_on_aws_is_virtual_host_style() {
        assert_eq!(
            object_url(None, "avatars", "eu-central-1", "images/u1/1-alice.png"),
            "https://avatars.s3.eu-central-1.amazonaws.com/images/u1/1-alice.png"
        );
    }
}

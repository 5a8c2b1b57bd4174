use async_trait::async_trait;
use tokio::sync::watch;

use super::{
    entities::{Asset, UploadProgress},
    error::AssetError,
};

/// Blob storage for user assets such as profile pictures
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Stores the asset under `key`, publishing transfer progress on `progress`
    async fn put_asset(
        &self,
        key: &str,
        asset: Asset,
        progress: &watch::Sender<UploadProgress>,
    ) -> Result<(), AssetError>;

    /// Reads back a stored asset
    async fn fetch_asset(&self, key: &str) -> Result<Option<Asset>, AssetError>;

    /// Public URL under which a stored asset is reachable
    fn public_url(&self, key: &str) -> Result<String, AssetError>;
}

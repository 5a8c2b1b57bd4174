use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{Instrument, debug, info_span};

use super::{
    entities::{Asset, UploadProgress},
    error::{AssetError, validate_key},
    storage::AssetStorage,
};

/// Runs asset uploads as background tasks
pub struct UploadService<S: AssetStorage + ?Sized> {
    storage: Arc<S>,
}

impl<S> UploadService<S>
where
    S: AssetStorage + ?Sized + 'static,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Starts uploading `asset` to `key` and returns immediately.
    ///
    /// The returned task resolves to the public URL of the stored asset once the
    /// transfer completed. Starting an upload says nothing about its success.
    pub fn spawn_upload(&self, key: String, asset: Asset) -> UploadTask {
        let (progress_tx, progress_rx) = watch::channel(UploadProgress::Pending);
        let storage = self.storage.clone();
        let span = info_span!("upload", key = %key, bytes = asset.size());
        let task_key = key.clone();

        let handle = tokio::spawn(
            async move {
                validate_key(&task_key)?;
                storage.put_asset(&task_key, asset, &progress_tx).await?;
                let url = storage.public_url(&task_key)?;
                progress_tx.send_replace(UploadProgress::Completed);
                debug!(url = %url, "upload completed");
                Ok::<_, AssetError>(url)
            }
            .instrument(span),
        );

        UploadTask {
            key,
            progress: progress_rx,
            handle,
        }
    }
}

/// Handle to a running upload. Dropping the handle aborts the upload.
pub struct UploadTask {
    key: String,
    progress: watch::Receiver<UploadProgress>,
    handle: JoinHandle<Result<String, AssetError>>,
}

impl UploadTask {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Subscribes to progress updates of the transfer
    pub fn progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Waits for the upload to finish and yields the public URL of the asset
    pub async fn wait(mut self) -> Result<String, AssetError> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(AssetError::Cancelled),
            Err(err) => Err(AssetError::Internal(err.to_string())),
        }
    }
}

impl Drop for UploadTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::storage::MockAssetStorage;
    use crate::database::inmemory::InMemoryDatabase;

    #[tokio::test]
    async fn test_upload_resolves_to_public_url() {
        let storage = Arc::new(InMemoryDatabase::with_assets_base_url(
            "https://cdn.example.com",
        ));
        let service = UploadService::new(storage.clone());

        let task = service.spawn_upload(
            "images/u1/avatar.png".to_string(),
            Asset::new(vec![7; 200_000], "image/png"),
        );
        let progress = task.progress();
        let url = task.wait().await.unwrap();

        assert_eq!(url, "https://cdn.example.com/images/u1/avatar.png");
        assert_eq!(*progress.borrow(), UploadProgress::Completed);
        let stored = storage
            .fetch_asset("images/u1/avatar.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.bytes.len(), 200_000);
    }

    #[tokio::test]
    async fn test_failed_transfer_yields_error_and_no_url() {
        let mut storage = MockAssetStorage::new();
        storage
            .expect_put_asset()
            .once()
            .returning(|_, _, _| Err(AssetError::Transfer("connection reset".to_string())));
        storage.expect_public_url().never();

        let service = UploadService::new(Arc::new(storage));
        let task = service.spawn_upload(
            "images/a.png".to_string(),
            Asset::new(vec![1], "image/png"),
        );

        assert!(matches!(task.wait().await, Err(AssetError::Transfer(_))));
    }

    #[tokio::test]
    async fn test_invalid_key_never_reaches_storage() {
        let storage = MockAssetStorage::new();
        let service = UploadService::new(Arc::new(storage));

        let task = service.spawn_upload(
            "../escape".to_string(),
            Asset::new(vec![1], "image/png"),
        );

        assert!(matches!(task.wait().await, Err(AssetError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_cancelled_upload_reports_cancelled() {
        // The current-thread runtime has not polled the task yet, so storage is never hit
        let storage = MockAssetStorage::new();
        let service = UploadService::new(Arc::new(storage));

        let task = service.spawn_upload(
            "images/slow.png".to_string(),
            Asset::new(vec![1], "image/png"),
        );
        assert_eq!(task.key(), "images/slow.png");
        task.cancel();

        assert!(matches!(task.wait().await, Err(AssetError::Cancelled)));
    }
}

use async_trait::async_trait;

use super::entities::ProfileRecord;
use super::error::ProfileError;

/// Document store holding profile records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileDatabase: Send + Sync {
    /// Writes a new profile record. Fails with `AlreadyExists` if the uid has one.
    async fn put_profile(&self, record: ProfileRecord) -> Result<(), ProfileError>;

    /// Get a profile record by uid
    async fn get_profile(&self, uid: &str) -> Result<Option<ProfileRecord>, ProfileError>;
}

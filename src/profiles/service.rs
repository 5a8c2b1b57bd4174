use std::sync::Arc;
use tracing::instrument;

use super::database::ProfileDatabase;
use super::entities::ProfileRecord;
use super::error::ProfileError;

pub struct ProfileService<D>
where
    D: ProfileDatabase + ?Sized,
{
    profile_db: Arc<D>,
}

impl<D> ProfileService<D>
where
    D: ProfileDatabase + ?Sized,
{
    pub fn new(profile_db: Arc<D>) -> Self {
        Self { profile_db }
    }

    /// Get the profile record of a user
    #[instrument(skip(self))]
    pub async fn get_profile(&self, uid: &str) -> Result<ProfileRecord, ProfileError> {
        self.profile_db
            .get_profile(uid)
            .await?
            .ok_or(ProfileError::NotFound)
    }
}

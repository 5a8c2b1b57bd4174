use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Name of the document collection holding profile records
pub const PROFILE_COLLECTION: &str = "user";

/// Public profile document of a registered user, keyed by uid
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Uid assigned by the authentication backend
    pub uid: String,
    pub display_name: String,
    pub email: String,
    /// Public URL of the uploaded profile picture, if one was provided
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

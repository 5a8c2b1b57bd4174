use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::crypto::salted_hash::SaltedHash;

/// Account as stored by the authentication backend
#[derive(Debug, Clone)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub password_hash: SaltedHash,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String, password_hash: SaltedHash) -> Self {
        Self {
            uid: Uuid::new_v4().simple().to_string(),
            email,
            password_hash,
            display_name: None,
            photo_url: None,
            created_at: Utc::now(),
        }
    }
}

/// The signed-up user handed back by the authentication backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl From<&Account> for AuthenticatedUser {
    fn from(account: &Account) -> Self {
        Self {
            uid: account.uid.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            photo_url: account.photo_url.clone(),
        }
    }
}

/// Mutable profile fields of an account. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

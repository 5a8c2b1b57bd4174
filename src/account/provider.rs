use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    database::AccountDatabase,
    entities::{Account, AuthenticatedUser, ProfileUpdate},
    error::AccountError,
};
use crate::crypto::salted_hash::SaltedHash;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Authentication backend used to sign up users
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates an account for the given credentials
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AccountError>;

    /// Sets display name and photo URL of an existing account
    async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
    ) -> Result<AuthenticatedUser, AccountError>;
}

/// Password-based authentication on top of the local account database
pub struct LocalAuthProvider<D: AccountDatabase + ?Sized> {
    account_db: Arc<D>,
}

impl<D: AccountDatabase + ?Sized> LocalAuthProvider<D> {
    pub fn new(account_db: Arc<D>) -> Self {
        Self { account_db }
    }
}

#[async_trait]
impl<D: AccountDatabase + ?Sized> AuthProvider for LocalAuthProvider<D> {
    #[instrument(skip(self, password))]
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AccountError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AccountError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AccountError::WeakPassword(MIN_PASSWORD_LENGTH));
        }

        if self.account_db.fetch_account_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailAlreadyInUse);
        }

        let account = Account::new(email, SaltedHash::generate_from(password)?);
        let user = AuthenticatedUser::from(&account);

        // The insert re-checks uniqueness, so concurrent sign-ups still collide here
        self.account_db.insert_account(account).await?;
        debug!(uid = %user.uid, "account created");

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
    ) -> Result<AuthenticatedUser, AccountError> {
        let mut account = self
            .account_db
            .fetch_account(uid)
            .await?
            .ok_or_else(|| AccountError::NotFound(uid.to_string()))?;

        if let Some(display_name) = update.display_name {
            account.display_name = Some(display_name);
        }
        if let Some(photo_url) = update.photo_url {
            account.photo_url = Some(photo_url);
        }

        let user = AuthenticatedUser::from(&account);
        self.account_db.update_account(account).await?;

        Ok(user)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Syntactic check: one `@`, non-empty local part, dotted domain without blanks
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

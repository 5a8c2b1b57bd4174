use async_trait::async_trait;

use super::entities::Account;

#[derive(Debug, thiserror::Error)]
pub enum AccountDatabaseError {
    #[error("Database operation failed")]
    OperationFailed,
    #[error("Account not found: {0}")]
    NotFound(String),
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountDatabase: Send + Sync {
    /// Inserts a new account, failing with `DuplicateEmail` if the email is taken
    async fn insert_account(&self, account: Account) -> Result<(), AccountDatabaseError>;
    async fn fetch_account(&self, uid: &str) -> Result<Option<Account>, AccountDatabaseError>;
    async fn fetch_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, AccountDatabaseError>;
    /// Overwrites an existing account, failing with `NotFound` if it does not exist
    async fn update_account(&self, account: Account) -> Result<(), AccountDatabaseError>;
}

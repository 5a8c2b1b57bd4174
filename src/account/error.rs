use thiserror::Error;

use super::database::AccountDatabaseError;
use crate::crypto::salted_hash::SaltedHashError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email address is malformed")]
    InvalidEmail,

    #[error("Password must be at least {0} characters long")]
    WeakPassword(usize),

    #[error("Email address is already in use")]
    EmailAlreadyInUse,

    #[error("Account {0} not found")]
    NotFound(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(AccountDatabaseError),
}

impl From<AccountDatabaseError> for AccountError {
    fn from(err: AccountDatabaseError) -> Self {
        match err {
            AccountDatabaseError::DuplicateEmail(_) => Self::EmailAlreadyInUse,
            AccountDatabaseError::NotFound(uid) => Self::NotFound(uid),
            AccountDatabaseError::OperationFailed => Self::Database(err),
        }
    }
}

impl From<SaltedHashError> for AccountError {
    fn from(err: SaltedHashError) -> Self {
        Self::Hashing(err.to_string())
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::{
    account::{
        database::{AccountDatabase, AccountDatabaseError},
        entities::Account,
    },
    assets::{
        entities::{Asset, UploadProgress},
        error::{AssetError, validate_key},
        storage::AssetStorage,
    },
    profiles::{database::ProfileDatabase, entities::ProfileRecord, error::ProfileError},
};

/// Chunk size used to report upload progress
const PROGRESS_CHUNK_BYTES: u64 = 64 * 1024;

pub struct InMemoryDatabase {
    pub accounts: Mutex<HashMap<String, Account>>,
    pub profiles: Mutex<HashMap<String, ProfileRecord>>,
    pub assets: Mutex<HashMap<String, Asset>>,
    assets_base_url: String,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::with_assets_base_url("memory://assets")
    }

    pub fn with_assets_base_url(base_url: impl Into<String>) -> Self {
        InMemoryDatabase {
            accounts: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            assets_base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountDatabase for InMemoryDatabase {
    async fn insert_account(&self, account: Account) -> Result<(), AccountDatabaseError> {
        let mut account_lock = self
            .accounts
            .lock()
            .map_err(|_| AccountDatabaseError::OperationFailed)?;

        if account_lock
            .values()
            .any(|existing| existing.email == account.email)
        {
            return Err(AccountDatabaseError::DuplicateEmail(account.email));
        }

        account_lock.insert(account.uid.clone(), account);
        Ok(())
    }

    async fn fetch_account(&self, uid: &str) -> Result<Option<Account>, AccountDatabaseError> {
        let account_lock = self
            .accounts
            .lock()
            .map_err(|_| AccountDatabaseError::OperationFailed)?;

        Ok(account_lock.get(uid).cloned())
    }

    async fn fetch_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, AccountDatabaseError> {
        let account_lock = self
            .accounts
            .lock()
            .map_err(|_| AccountDatabaseError::OperationFailed)?;

        let account = account_lock
            .values()
            .find(|account| account.email == email)
            .cloned();
        Ok(account)
    }

    async fn update_account(&self, account: Account) -> Result<(), AccountDatabaseError> {
        let mut account_lock = self
            .accounts
            .lock()
            .map_err(|_| AccountDatabaseError::OperationFailed)?;

        let Some(existing) = account_lock.get_mut(&account.uid) else {
            return Err(AccountDatabaseError::NotFound(account.uid));
        };

        *existing = account;
        Ok(())
    }
}

#[async_trait]
impl ProfileDatabase for InMemoryDatabase {
    async fn put_profile(&self, record: ProfileRecord) -> Result<(), ProfileError> {
        let mut profiles_lock = self
            .profiles
            .lock()
            .map_err(|_| ProfileError::Database("Lock poisoned".to_string()))?;

        if profiles_lock.contains_key(&record.uid) {
            return Err(ProfileError::AlreadyExists(record.uid));
        }

        profiles_lock.insert(record.uid.clone(), record);
        Ok(())
    }

    async fn get_profile(&self, uid: &str) -> Result<Option<ProfileRecord>, ProfileError> {
        let profiles_lock = self
            .profiles
            .lock()
            .map_err(|_| ProfileError::Database("Lock poisoned".to_string()))?;

        Ok(profiles_lock.get(uid).cloned())
    }
}

#[async_trait]
impl AssetStorage for InMemoryDatabase {
    async fn put_asset(
        &self,
        key: &str,
        asset: Asset,
        progress: &watch::Sender<UploadProgress>,
    ) -> Result<(), AssetError> {
        validate_key(key)?;

        let total_bytes = asset.size();
        let mut bytes_transferred = 0;
        while bytes_transferred < total_bytes {
            bytes_transferred = (bytes_transferred + PROGRESS_CHUNK_BYTES).min(total_bytes);
            progress.send_replace(UploadProgress::Transferring {
                bytes_transferred,
                total_bytes,
            });
        }

        let mut assets_lock = self
            .assets
            .lock()
            .map_err(|_| AssetError::Internal("Lock poisoned".to_string()))?;
        assets_lock.insert(key.to_string(), asset);
        Ok(())
    }

    async fn fetch_asset(&self, key: &str) -> Result<Option<Asset>, AssetError> {
        validate_key(key)?;

        let assets_lock = self
            .assets
            .lock()
            .map_err(|_| AssetError::Internal("Lock poisoned".to_string()))?;
        Ok(assets_lock.get(key).cloned())
    }

    fn public_url(&self, key: &str) -> Result<String, AssetError> {
        validate_key(key)?;
        Ok(format!("{}/{}", self.assets_base_url, key))
    }
}

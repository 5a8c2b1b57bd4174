use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::{
    account::{
        database::AccountDatabase,
        provider::{AuthProvider, LocalAuthProvider},
    },
    assets::storage::AssetStorage,
    database::{
        inmemory::InMemoryDatabase, pool::create_sqlite_pool, s3::S3Storage, sqlite::SqliteDatabase,
    },
    profiles::{database::ProfileDatabase, service::ProfileService},
    registration::service::RegistrationService,
    settings::{AssetsDatabaseSettings, CoreDatabaseSettings, RegistrationSettings, Settings},
};

pub struct AppContext {
    pub registration_service:
        RegistrationService<dyn AuthProvider, dyn AssetStorage, dyn ProfileDatabase>,
    pub profile_service: ProfileService<dyn ProfileDatabase>,
    pub asset_storage: Arc<dyn AssetStorage>,
}

impl AppContext {
    pub fn new(
        account_db: Arc<dyn AccountDatabase>,
        profile_db: Arc<dyn ProfileDatabase>,
        asset_storage: Arc<dyn AssetStorage>,
        registration_settings: RegistrationSettings,
    ) -> Self {
        let auth_provider: Arc<dyn AuthProvider> = Arc::new(LocalAuthProvider::new(account_db));

        let registration_service = RegistrationService::new(
            auth_provider,
            asset_storage.clone(),
            profile_db.clone(),
            registration_settings,
        );
        let profile_service = ProfileService::new(profile_db);

        Self {
            registration_service,
            profile_service,
            asset_storage,
        }
    }
}

/// Creates the application context from the configured backends
pub async fn start_application(settings: &Settings) -> Result<AppContext> {
    // Core Database
    let account_db: Arc<dyn AccountDatabase>;
    let profile_db: Arc<dyn ProfileDatabase>;
    match &settings.database.core {
        CoreDatabaseSettings::InMemory => {
            info!("Using in-memory core database");
            let db = Arc::new(InMemoryDatabase::new());
            account_db = db.clone();
            profile_db = db;
        }
        CoreDatabaseSettings::Sqlite { path } => {
            info!("Using sqlite core database at {}", path);
            let db_pool = create_sqlite_pool(path).await?;
            let db = Arc::new(SqliteDatabase::new(db_pool));
            db.init().await?;
            account_db = db.clone();
            profile_db = db;
        }
    }

    // Assets Database
    let asset_storage: Arc<dyn AssetStorage> = match &settings.database.assets {
        AssetsDatabaseSettings::InMemory { base_url } => {
            info!("Using in-memory asset storage served at {}", base_url);
            Arc::new(InMemoryDatabase::with_assets_base_url(base_url.clone()))
        }
        AssetsDatabaseSettings::S3 {
            bucket,
            region,
            access_key,
            secret_key,
            endpoint,
        } => {
            info!("Using s3 asset storage in bucket {}", bucket);
            Arc::new(
                S3Storage::new(
                    bucket.clone(),
                    region.clone(),
                    access_key.clone(),
                    secret_key.clone(),
                    endpoint.clone(),
                )
                .await,
            )
        }
    };

    Ok(AppContext::new(
        account_db,
        profile_db,
        asset_storage,
        settings.registration.clone(),
    ))
}

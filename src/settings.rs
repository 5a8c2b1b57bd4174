use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const ENV_PREFIX: &str = "STOREFRONT";

#[derive(Debug, Clone, Deserialize)]
pub struct WebserverSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound for a registration request body, profile image included
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum CoreDatabaseSettings {
    InMemory,
    Sqlite { path: String },
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum AssetsDatabaseSettings {
    InMemory {
        #[serde(default = "default_assets_base_url")]
        base_url: String,
    },
    S3 {
        bucket: String,
        region: String,
        access_key: String,
        secret_key: String,
        endpoint: Option<String>,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub core: CoreDatabaseSettings,
    pub assets: AssetsDatabaseSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationSettings {
    /// Where the client is sent after a successful registration
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default)]
    pub require_profile_image: bool,
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    #[serde(default = "default_provision_timeout_secs")]
    pub provision_timeout_secs: u64,
}

impl RegistrationSettings {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            require_profile_image: false,
            auth_timeout_secs: default_auth_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
            provision_timeout_secs: default_provision_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub webserver: WebserverSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub registration: RegistrationSettings,
}

impl Settings {
    pub fn load() -> Result<Settings, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings"))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_assets_base_url() -> String {
    "http://localhost:48080/assets".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_auth_timeout_secs() -> u64 {
    10
}

fn default_upload_timeout_secs() -> u64 {
    60
}

fn default_provision_timeout_secs() -> u64 {
    10
}

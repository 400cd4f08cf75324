use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::prelude::*;

/// Environment variable pointing at the bootstrap config file
pub const CONFIG_PATH_VAR: &str = "BOOTSTRAP_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "bootstrap.toml";

pub const PACKAGE_VERSION: &'static str = std::env!("CARGO_PKG_VERSION");

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub mongodb: MongoConfig,
    pub credentials: CredentialsConfig,
    pub target: TargetConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MongoConfig {
    pub host: String,
    pub port: u16,
    /// Full connection string, takes precedence over host and port
    pub uri: Option<String>,
    pub app_name: String,
    pub server_selection_timeout_secs: Option<u64>,
}

/// Names of the environment variables holding the root credentials
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CredentialsConfig {
    pub username_var: String,
    pub password_var: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct TargetConfig {
    pub admin_database: String,
    pub database: String,
    pub collection: String,
    pub unique_field: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for timestamped log files; terminal only when unset
    pub directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str::<Config>(
            r#"
            [mongodb]
            host = 'localhost'
            port = 27017
            app_name = 'f1-discord-bootstrap'

            [credentials]
            username_var = 'MONGO_INITDB_ROOT_USERNAME'
            password_var = 'MONGO_INITDB_ROOT_PASSWORD'

            [target]
            admin_database = 'admin'
            database = 'f1_discord_app'
            collection = 'locations'
            unique_field = 'meeting_key'

            [logging]
            level = 'info'
            "#,
        )
        .expect("built-in default config is valid TOML")
    }
}

impl MongoConfig {
    pub fn connection_uri(&self) -> String {
        match &self.uri {
            Some(uri) => uri.clone(),
            None => format!("mongodb://{}:{}", self.host, self.port),
        }
    }

    pub fn server_selection_timeout(&self) -> Option<Duration> {
        self.server_selection_timeout_secs.map(Duration::from_secs)
    }
}

impl TargetConfig {
    pub fn plan(&self) -> BootstrapPlan {
        BootstrapPlan {
            admin_database: self.admin_database.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            unique_field: self.unique_field.clone(),
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> BResult<slog::Level> {
        self.level.parse::<slog::Level>().map_err(|_| {
            BootstrapError::configuration(format!("unknown log level '{}'", self.level))
        })
    }
}

pub fn read<T>(cfg_path: &Path) -> BResult<T>
where
    T: DeserializeOwned,
{
    let contents = std::fs::read_to_string(cfg_path)?;
    let config = toml::from_str::<T>(&contents)?;
    Ok(config)
}

/// Reads the config at `cfg_path`, falling back to the defaults when
/// the file does not exist. A file that exists but does not parse is
/// an error.
pub fn read_or_default<T>(cfg_path: &Path) -> BResult<T>
where
    T: Default + DeserializeOwned,
{
    if !cfg_path.exists() {
        return Ok(T::default());
    }
    read::<T>(cfg_path)
}

/// Resolves the config path from an optional override, as read from
/// `BOOTSTRAP_CONFIG_PATH` by the binary
pub fn config_path(override_path: Option<String>) -> PathBuf {
    override_path
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

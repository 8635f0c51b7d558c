//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The application secret and subscription key are loaded from
//! SKY_APPLICATION_SECRET / SKY_SUBSCRIPTION_KEY or from the configured
//! secret files, never from the TOML body.
//!
//! Missing registration values are not load errors: the home page reports
//! them so the operator can see everything that still needs filling in.

use common::{Secret, resolve_secret};
use payments_api::DEFAULT_API_BASE_URL;
use serde::Deserialize;
use sky_auth::{ClientApplicationIdentity, DEFAULT_OAUTH_BASE_URL};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const APPLICATION_SECRET_ENV: &str = "SKY_APPLICATION_SECRET";
pub const SUBSCRIPTION_KEY_ENV: &str = "SKY_SUBSCRIPTION_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub sky_api: SkyApiConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Applied to every outbound request (token endpoint and resource API)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Sky API application registration and endpoints
#[derive(Debug, Deserialize)]
pub struct SkyApiConfig {
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub callback_uri: String,
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub application_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub subscription_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub application_secret: Option<Secret<String>>,
    #[serde(skip)]
    pub subscription_key: Option<Secret<String>>,
}

impl Default for SkyApiConfig {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            callback_uri: String::new(),
            oauth_base_url: default_oauth_base_url(),
            api_base_url: default_api_base_url(),
            application_secret_file: None,
            subscription_key_file: None,
            application_secret: None,
            subscription_key: None,
        }
    }
}

impl SkyApiConfig {
    /// Registration handed to the auth and payments crates. Unset secrets
    /// become empty strings; diagnostics flag them.
    pub fn identity(&self) -> ClientApplicationIdentity {
        ClientApplicationIdentity::new(
            self.application_id.trim(),
            self.application_secret.clone().unwrap_or_else(Secret::empty),
            self.callback_uri.trim(),
            self.subscription_key.clone().unwrap_or_else(Secret::empty),
        )
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_oauth_base_url() -> String {
    DEFAULT_OAUTH_BASE_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn require_http_scheme(field: &str, url: &str) -> common::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {url}"
        )))
    }
}

impl Config {
    /// Load configuration from a TOML file, then resolve secrets from the
    /// environment or secret files.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http_scheme("oauth_base_url", &config.sky_api.oauth_base_url)?;
        require_http_scheme("api_base_url", &config.sky_api.api_base_url)?;

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        config.sky_api.application_secret = resolve_secret(
            APPLICATION_SECRET_ENV,
            config.sky_api.application_secret_file.as_deref(),
        )?;
        config.sky_api.subscription_key = resolve_secret(
            SUBSCRIPTION_KEY_ENV,
            config.sky_api.subscription_key_file.as_deref(),
        )?;

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("checkout-service.toml")
    }
}

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `LESSON_API_URL` overrides `api.base_url` so the same file can point at
//! different deployments.

use serde::Deserialize;
use session::SessionConfig;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "lesson-client.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// API endpoint settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_me_path")]
    pub me_path: String,
}

/// Where the credential pair is persisted between invocations
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_login_path() -> String {
    lesson_auth::LOGIN_PATH.to_string()
}

fn default_refresh_path() -> String {
    lesson_auth::REFRESH_PATH.to_string()
}

fn default_logout_path() -> String {
    lesson_auth::LOGOUT_PATH.to_string()
}

fn default_me_path() -> String {
    lesson_auth::ME_PATH.to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from(".lesson-client").join("tokens.json")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            me_path: default_me_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Built-in defaults with environment overrides, for runs without a file.
    pub fn defaults() -> common::Result<Self> {
        Config {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
        }
        .finish()
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(url) = std::env::var("LESSON_API_URL") {
            self.api.base_url = url;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        for (name, path) in [
            ("login_path", &self.api.login_path),
            ("refresh_path", &self.api.refresh_path),
            ("logout_path", &self.api.logout_path),
            ("me_path", &self.api.me_path),
        ] {
            if !path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "{name} must start with '/', got: {path}"
                )));
            }
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag tells whether the path was asked for explicitly; only then is
    /// a missing file an error.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            base_url: self.api.base_url.clone(),
            login_path: self.api.login_path.clone(),
            refresh_path: self.api.refresh_path.clone(),
            logout_path: self.api.logout_path.clone(),
            me_path: self.api.me_path.clone(),
        }
    }
}

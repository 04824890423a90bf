// File: src/config.rs
// Purpose: Configuration parsing from redirect.toml

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::RedirectError;
use crate::response::ensure_redirect_status;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub redirect: RedirectConfig,

    #[serde(default)]
    pub flash: FlashKeys,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Defaults applied to every redirect built by a `Redirector`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// Status code for `to`, `back` and `refresh` (default: 302)
    #[serde(default = "default_status")]
    pub status: u16,

    /// Also emit `HX-Redirect` when the request came from htmx
    #[serde(default = "default_true")]
    pub htmx: bool,

    /// Where `back` goes when neither Referer nor a previous URL is known
    #[serde(default = "default_fallback")]
    pub fallback: String,
}

/// Session keys used for flashed data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashKeys {
    #[serde(default = "default_old_input")]
    pub old_input: String,

    #[serde(default = "default_errors")]
    pub errors: String,

    /// Bag name used by `with_errors` when none is given
    #[serde(default = "default_bag")]
    pub default_bag: String,

    #[serde(default = "default_previous_url")]
    pub previous_url: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

// Default values
fn default_status() -> u16 {
    302
}

fn default_true() -> bool {
    true
}

fn default_fallback() -> String {
    "/".to_string()
}

fn default_old_input() -> String {
    "_old_input".to_string()
}

fn default_errors() -> String {
    "errors".to_string()
}

fn default_bag() -> String {
    "default".to_string()
}

fn default_previous_url() -> String {
    "_previous.url".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            htmx: true,
            fallback: default_fallback(),
        }
    }
}

impl Default for FlashKeys {
    fn default() -> Self {
        Self {
            old_input: default_old_input(),
            errors: default_errors(),
            default_bag: default_bag(),
            previous_url: default_previous_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl RedirectConfig {
    /// The configured status, checked to be a redirect code.
    pub fn status_code(&self) -> Result<StatusCode, RedirectError> {
        let status =
            StatusCode::from_u16(self.status).map_err(|_| RedirectError::NotARedirect(self.status))?;
        ensure_redirect_status(status)?;
        Ok(status)
    }
}

impl Config {
    /// Load configuration from redirect.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist or is empty, return default config
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config
            .redirect
            .status_code()
            .with_context(|| format!("Invalid [redirect] status in {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./redirect.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("redirect.toml")
    }
}

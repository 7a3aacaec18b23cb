//! Environment-driven runtime configuration.
//!
//! Loaded once at startup, after `dotenvy` has had a chance to populate the
//! environment from a `.env` file.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    pub bind_addr: String,
    /// Base URL of the listings API, e.g. `https://api.example.com`.
    pub api_base_url: String,
    /// Optional bearer token attached to listings API calls.
    pub api_token: Option<String>,
    /// Timeout applied to every listings API request.
    pub remote_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let api_base_url =
            env::var("LISTINGS_API_URL").context("LISTINGS_API_URL environment variable not set")?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let api_token = env::var("LISTINGS_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let remote_timeout = env::var("REMOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS));

        Ok(Self {
            bind_addr,
            api_base_url,
            api_token,
            remote_timeout,
        })
    }
}

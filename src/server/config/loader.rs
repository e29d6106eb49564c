// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration loader for ssh-proxy-auth.
//!
//! This module handles loading configuration from multiple sources with
//! the following precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file (YAML)
//! 3. Default values

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use russh::keys::ssh_key::PublicKey;
use url::Url;

use super::types::ProxyAuthConfig;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "SSH_PROXY_";

/// Load configuration from file and environment.
///
/// # Default Locations
///
/// If no config path is specified, searches in order:
/// 1. `./ssh-proxy-auth.yaml` (current directory)
/// 2. `/etc/ssh-proxy-auth/ssh-proxy-auth.yaml` (system-wide)
/// 3. `$XDG_CONFIG_HOME/ssh-proxy-auth/ssh-proxy-auth.yaml` (user-specific)
///
/// # Environment Variables
///
/// - `SSH_PROXY_SCHEDULER_ADDRESS` - Scheduler base URL
/// - `SSH_PROXY_CONTROL_PLANE_URL` - Control plane base URL
/// - `SSH_PROXY_TOKEN_URL` - Identity provider token endpoint
/// - `SSH_PROXY_CLIENT_ID` - Token exchange client identifier
/// - `SSH_PROXY_CLIENT_SECRET` - Token exchange client secret
/// - `SSH_PROXY_SHARED_SECRET` - Proxy-internal shared secret
/// - `SSH_PROXY_ENABLE_PLATFORM_AUTH` - `true`/`false`
/// - `SSH_PROXY_ENABLE_SHARED_SECRET_AUTH` - `true`/`false`
/// - `SSH_PROXY_COMMUNICATION_TIMEOUT` - HTTP timeout in seconds
///
/// # Example
///
/// ```no_run
/// use ssh_proxy_auth::server::config::load_config;
///
/// # fn main() -> anyhow::Result<()> {
/// let config = load_config(Some("/etc/ssh-proxy-auth/ssh-proxy-auth.yaml".as_ref()))?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, an environment
/// variable has an invalid value, or validation fails.
pub fn load_config(config_path: Option<&Path>) -> Result<ProxyAuthConfig> {
    let mut config = ProxyAuthConfig::default();

    if let Some(path) = config_path {
        config = load_config_file(path).context("Failed to load configuration file")?;
        tracing::info!(path = %path.display(), "Loaded configuration from file");
    } else {
        for path in default_config_paths() {
            if path.exists() {
                config = load_config_file(&path).context("Failed to load configuration file")?;
                tracing::info!(path = %path.display(), "Loaded configuration from file");
                break;
            }
        }
    }

    config = apply_env_overrides(config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Generate a configuration template as YAML string.
pub fn generate_config_template() -> String {
    let config = ProxyAuthConfig::default();
    let mut yaml = String::new();

    yaml.push_str("# ssh-proxy-auth configuration file\n");
    yaml.push_str("#\n");
    yaml.push_str("# Configuration hierarchy (highest to lowest precedence):\n");
    yaml.push_str("# 1. Environment variables (SSH_PROXY_* prefix)\n");
    yaml.push_str("# 2. This configuration file\n");
    yaml.push_str("# 3. Default values\n");
    yaml.push_str("#\n");
    yaml.push_str("# Enable at least one strategy under `auth`. Secrets may be\n");
    yaml.push_str("# supplied through SSH_PROXY_SHARED_SECRET and SSH_PROXY_CLIENT_SECRET.\n\n");

    yaml.push_str(&serde_yaml::to_string(&config).unwrap_or_default());

    yaml.push_str("\n# Platform strategy endpoints:\n");
    yaml.push_str("#   control_plane_url: \"https://cloud-controller.service.internal:9024\"\n");
    yaml.push_str("#   token_url: \"https://uaa.service.internal:8443/oauth/token\"\n");
    yaml.push_str("#   client_id: \"ssh-proxy\"\n");
    yaml.push_str("#   client_secret: \"...\"\n");
    yaml.push_str("#\n# Public key strategy:\n");
    yaml.push_str("#   authorized_key: \"ssh-ed25519 AAAA... operator@host\"\n");

    yaml
}

/// Load configuration from a YAML file.
pub(crate) fn load_config_file(path: &Path) -> Result<ProxyAuthConfig> {
    let content =
        std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;

    serde_yaml::from_str(&content).context(format!("Failed to parse {}", path.display()))
}

/// Get default configuration file search paths.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("./ssh-proxy-auth.yaml"),
        PathBuf::from("/etc/ssh-proxy-auth/ssh-proxy-auth.yaml"),
    ];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("ssh-proxy-auth/ssh-proxy-auth.yaml"));
    }

    paths
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    env_var(name)
        .map(|value| match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("Invalid {ENV_PREFIX}{name} value: {value}"),
        })
        .transpose()
}

/// Apply environment variable overrides to configuration.
fn apply_env_overrides(mut config: ProxyAuthConfig) -> Result<ProxyAuthConfig> {
    if let Some(address) = env_var("SCHEDULER_ADDRESS") {
        tracing::debug!(address = %address, "Applied SSH_PROXY_SCHEDULER_ADDRESS override");
        config.scheduler.address = address;
    }

    if let Some(url) = env_var("CONTROL_PLANE_URL") {
        tracing::debug!(url = %url, "Applied SSH_PROXY_CONTROL_PLANE_URL override");
        config.auth.platform.control_plane_url = Some(url);
    }

    if let Some(url) = env_var("TOKEN_URL") {
        tracing::debug!(url = %url, "Applied SSH_PROXY_TOKEN_URL override");
        config.auth.platform.token_url = Some(url);
    }

    if let Some(client_id) = env_var("CLIENT_ID") {
        tracing::debug!(client_id = %client_id, "Applied SSH_PROXY_CLIENT_ID override");
        config.auth.platform.client_id = Some(client_id);
    }

    if let Some(client_secret) = env_var("CLIENT_SECRET") {
        tracing::debug!("Applied SSH_PROXY_CLIENT_SECRET override");
        config.auth.platform.client_secret = Some(client_secret);
    }

    if let Some(secret) = env_var("SHARED_SECRET") {
        tracing::debug!("Applied SSH_PROXY_SHARED_SECRET override");
        config.auth.shared_secret.secret = Some(secret);
    }

    if let Some(enabled) = env_bool("ENABLE_PLATFORM_AUTH")? {
        config.auth.platform.enabled = enabled;
        tracing::debug!(enabled, "Applied SSH_PROXY_ENABLE_PLATFORM_AUTH override");
    }

    if let Some(enabled) = env_bool("ENABLE_SHARED_SECRET_AUTH")? {
        config.auth.shared_secret.enabled = enabled;
        tracing::debug!(
            enabled,
            "Applied SSH_PROXY_ENABLE_SHARED_SECRET_AUTH override"
        );
    }

    if let Some(timeout_str) = env_var("COMMUNICATION_TIMEOUT") {
        config.http.communication_timeout_secs = timeout_str.parse().context(format!(
            "Invalid SSH_PROXY_COMMUNICATION_TIMEOUT value: {timeout_str}"
        ))?;
        tracing::debug!(
            timeout = config.http.communication_timeout_secs,
            "Applied SSH_PROXY_COMMUNICATION_TIMEOUT override"
        );
    }

    Ok(config)
}

fn require<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => anyhow::bail!("{what} is required for platform authentication"),
    }
}

/// Validate configuration for correctness.
pub fn validate_config(config: &ProxyAuthConfig) -> Result<()> {
    Url::parse(&config.scheduler.address).context(format!(
        "Invalid scheduler address: {}",
        config.scheduler.address
    ))?;

    if config.scheduler.request_timeout_secs == 0 {
        anyhow::bail!("scheduler.request_timeout_secs must be greater than 0");
    }

    if config.http.communication_timeout_secs == 0 {
        anyhow::bail!("http.communication_timeout_secs must be greater than 0");
    }

    let auth = &config.auth;
    if !auth.any_enabled() {
        anyhow::bail!(
            "At least one authentication strategy must be enabled (auth.shared_secret, auth.platform or auth.publickey)"
        );
    }

    if auth.shared_secret.enabled {
        if auth.shared_secret.realm.is_empty() {
            anyhow::bail!("auth.shared_secret.realm cannot be empty");
        }
        match auth.shared_secret.secret.as_deref() {
            Some(secret) if !secret.is_empty() => {}
            _ => anyhow::bail!("A shared secret is required for shared-secret authentication"),
        }
    }

    if auth.platform.enabled {
        if auth.platform.realm.is_empty() {
            anyhow::bail!("auth.platform.realm cannot be empty");
        }

        let control_plane_url = require(&auth.platform.control_plane_url, "control_plane_url")?;
        Url::parse(control_plane_url)
            .context(format!("Invalid control_plane_url: {control_plane_url}"))?;

        let token_url = require(&auth.platform.token_url, "token_url")?;
        Url::parse(token_url).context(format!("Invalid token_url: {token_url}"))?;

        require(&auth.platform.client_id, "client_id")?;
        require(&auth.platform.client_secret, "client_secret")?;
    }

    if auth.shared_secret.enabled
        && auth.platform.enabled
        && auth.shared_secret.realm == auth.platform.realm
    {
        anyhow::bail!(
            "Shared-secret and platform authentication must use distinct realms (both are '{}')",
            auth.platform.realm
        );
    }

    if let Some(key) = &auth.publickey.authorized_key {
        PublicKey::from_openssh(key.trim()).context("Invalid auth.publickey.authorized_key")?;
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}

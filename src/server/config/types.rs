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

//! Configuration types for ssh-proxy-auth.
//!
//! This module defines the configuration schema for YAML file-based
//! configuration. All types support serde serialization/deserialization.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::server::auth::{platform, shared_secret};

/// Root configuration loaded from YAML files.
///
/// # Example YAML
///
/// ```yaml
/// scheduler:
///   address: "http://bbs.service.internal:8889"
///   request_timeout_secs: 10
///
/// http:
///   communication_timeout_secs: 10
///
/// auth:
///   shared_secret:
///     enabled: true
///     secret: "proxy-secret"
///   platform:
///     enabled: true
///     control_plane_url: "https://cloud-controller.service.internal:9024"
///     token_url: "https://uaa.service.internal:8443/oauth/token"
///     client_id: "ssh-proxy"
///     client_secret: "client-secret"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyAuthConfig {
    /// Scheduler API settings.
    pub scheduler: SchedulerConfig,

    /// Outbound HTTP settings for the identity provider and control plane.
    pub http: HttpConfig,

    /// Authentication strategies.
    pub auth: AuthConfig,
}

/// Scheduler API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Base URL of the scheduler API.
    ///
    /// Default: "http://127.0.0.1:8889"
    pub address: String,

    /// Per-request timeout in seconds.
    ///
    /// Default: 10
    pub request_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            address: default_scheduler_address(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout in seconds for identity provider and control plane calls.
    ///
    /// Default: 10
    pub communication_timeout_secs: u64,

    /// Accept invalid TLS certificates. Only for test deployments.
    ///
    /// Default: false
    pub skip_cert_verify: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            communication_timeout_secs: default_timeout_secs(),
            skip_cert_verify: false,
        }
    }
}

impl HttpConfig {
    pub fn communication_timeout(&self) -> Duration {
        Duration::from_secs(self.communication_timeout_secs)
    }

    /// Build the shared HTTP client for the token and access-check calls.
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.communication_timeout())
            .danger_accept_invalid_certs(self.skip_cert_verify)
            .build()
    }
}

/// Authentication strategy settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Proxy-internal shared-secret strategy.
    pub shared_secret: SharedSecretAuthConfig,

    /// Platform token-exchange strategy.
    pub platform: PlatformAuthConfig,

    /// Administrative public key strategy.
    pub publickey: PublicKeyAuthConfig,
}

impl AuthConfig {
    /// Whether any strategy is configured.
    pub fn any_enabled(&self) -> bool {
        self.shared_secret.enabled || self.platform.enabled || self.publickey.enabled()
    }
}

/// Shared-secret strategy settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SharedSecretAuthConfig {
    /// Default: false
    pub enabled: bool,

    /// Username realm.
    ///
    /// Default: "diego"
    pub realm: String,

    /// The pre-shared secret. Required when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Default for SharedSecretAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            realm: shared_secret::DEFAULT_REALM.to_string(),
            secret: None,
        }
    }
}

impl fmt::Debug for SharedSecretAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecretAuthConfig")
            .field("enabled", &self.enabled)
            .field("realm", &self.realm)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Platform strategy settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformAuthConfig {
    /// Default: false
    pub enabled: bool,

    /// Username realm.
    ///
    /// Default: "cf"
    pub realm: String,

    /// Base URL of the control plane internal API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_url: Option<String>,

    /// Identity provider token endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    /// Client identifier for the token exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret for the token exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl Default for PlatformAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            realm: platform::DEFAULT_REALM.to_string(),
            control_plane_url: None,
            token_url: None,
            client_id: None,
            client_secret: None,
        }
    }
}

impl fmt::Debug for PlatformAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformAuthConfig")
            .field("enabled", &self.enabled)
            .field("realm", &self.realm)
            .field("control_plane_url", &self.control_plane_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Public key strategy settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PublicKeyAuthConfig {
    /// One OpenSSH public key line. The strategy is enabled when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_key: Option<String>,
}

impl PublicKeyAuthConfig {
    pub fn enabled(&self) -> bool {
        self.authorized_key.is_some()
    }
}

fn default_scheduler_address() -> String {
    "http://127.0.0.1:8889".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProxyAuthConfig::default();
        assert_eq!(config.scheduler.address, "http://127.0.0.1:8889");
        assert_eq!(config.scheduler.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.http.communication_timeout_secs, 10);
        assert!(!config.http.skip_cert_verify);
        assert_eq!(config.auth.shared_secret.realm, "diego");
        assert_eq!(config.auth.platform.realm, "cf");
        assert!(!config.auth.any_enabled());
    }

    #[test]
    fn test_yaml_deserialization() {
        let yaml = r#"
scheduler:
  address: "http://bbs.internal:8889"
auth:
  shared_secret:
    enabled: true
    secret: "s3cret"
  platform:
    enabled: true
    realm: "platform"
    control_plane_url: "https://cc.internal"
    token_url: "https://uaa.internal/oauth/token"
    client_id: "ssh-proxy"
    client_secret: "client-secret"
"#;

        let config: ProxyAuthConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scheduler.address, "http://bbs.internal:8889");
        assert_eq!(config.scheduler.request_timeout_secs, 10);
        assert!(config.auth.shared_secret.enabled);
        assert_eq!(config.auth.shared_secret.realm, "diego");
        assert_eq!(config.auth.shared_secret.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.platform.realm, "platform");
        assert_eq!(config.auth.platform.client_id.as_deref(), Some("ssh-proxy"));
        assert!(!config.auth.publickey.enabled());
        assert!(config.auth.any_enabled());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ProxyAuthConfig {
            auth: AuthConfig {
                shared_secret: SharedSecretAuthConfig {
                    enabled: true,
                    secret: Some("s3cret".to_string()),
                    ..Default::default()
                },
                platform: PlatformAuthConfig {
                    client_secret: Some("client-secret".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("client-secret"));
    }

    #[test]
    fn test_http_client_builds() {
        assert!(HttpConfig::default().build_client().is_ok());
    }
}

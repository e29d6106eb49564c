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

//! Composite authenticator.
//!
//! The single entry point the SSH server calls. Password attempts are routed
//! by username: strategies are tried in registration order and the first
//! whose pattern matches handles the attempt. Its result is returned
//! unmodified. Public key attempts go to the one public key strategy, if
//! configured.

use std::sync::Arc;

use anyhow::{Context, Result};
use russh::keys::ssh_key::PublicKey;
use url::Url;

use super::control_plane::ControlPlaneClient;
use super::identity::TokenExchanger;
use super::platform::PlatformAuthenticator;
use super::provider::{PasswordAuthenticator, PublicKeyAuthenticator};
use super::publickey::StaticKeyAuthenticator;
use super::resolver::{PermissionResolver, PermissionsBuilder};
use super::shared_secret::SharedSecretAuthenticator;
use crate::server::config::ProxyAuthConfig;
use crate::server::scheduler::{HttpScheduler, Scheduler};
use crate::shared::auth_types::{ConnectionMetadata, Credential};
use crate::shared::error::AuthError;
use crate::shared::permissions::Permissions;

/// Dispatches authentication attempts to the registered strategies.
///
/// Built once at startup and read-only afterwards, so one instance can be
/// shared by every connection task.
///
/// # Example
///
/// ```no_run
/// use ssh_proxy_auth::server::auth::CompositeAuthenticator;
/// use ssh_proxy_auth::server::config::load_config;
/// use ssh_proxy_auth::shared::{ConnectionMetadata, Credential};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = load_config(None)?;
/// let authenticator = CompositeAuthenticator::from_config(&config)?;
///
/// let metadata = ConnectionMetadata::new("diego:some-guid/0", "10.0.0.1:52000".parse()?);
/// let permissions = authenticator
///     .authenticate(&metadata, &Credential::password("secret"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CompositeAuthenticator {
    password_authenticators: Vec<Arc<dyn PasswordAuthenticator>>,
    publickey_authenticator: Option<Arc<dyn PublicKeyAuthenticator>>,
}

impl CompositeAuthenticator {
    /// Create a dispatcher.
    ///
    /// Password strategies are evaluated in the given order. Their username
    /// patterns should be mutually exclusive; where they overlap, the
    /// earlier strategy wins.
    pub fn new(
        password_authenticators: Vec<Arc<dyn PasswordAuthenticator>>,
        publickey_authenticator: Option<Arc<dyn PublicKeyAuthenticator>>,
    ) -> Self {
        tracing::info!(
            realms = ?password_authenticators.iter().map(|a| a.realm()).collect::<Vec<_>>(),
            publickey_enabled = publickey_authenticator.is_some(),
            "Composite authenticator initialized"
        );

        Self {
            password_authenticators,
            publickey_authenticator,
        }
    }

    /// Build the strategies enabled in `config`, resolving permissions
    /// through an [`HttpScheduler`].
    pub fn from_config(config: &ProxyAuthConfig) -> Result<Self> {
        let scheduler = HttpScheduler::new(
            &config.scheduler.address,
            config.scheduler.request_timeout(),
        )
        .context("Failed to create scheduler client")?;

        Self::from_config_with_scheduler(config, Arc::new(scheduler))
    }

    /// Build the strategies enabled in `config` on top of `scheduler`.
    ///
    /// The shared-secret strategy is registered before the platform one.
    pub fn from_config_with_scheduler(
        config: &ProxyAuthConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let builder: Arc<dyn PermissionsBuilder> = Arc::new(PermissionResolver::new(scheduler));
        let auth = &config.auth;
        let mut password_authenticators: Vec<Arc<dyn PasswordAuthenticator>> = Vec::new();

        if auth.shared_secret.enabled {
            let secret = auth
                .shared_secret
                .secret
                .as_deref()
                .context("A shared secret is required for shared-secret authentication")?;
            let authenticator = SharedSecretAuthenticator::new(
                auth.shared_secret.realm.as_str(),
                secret,
                builder.clone(),
            )
            .context("Invalid shared-secret realm")?;
            password_authenticators.push(Arc::new(authenticator));
        }

        if auth.platform.enabled {
            let platform = &auth.platform;
            let client = config
                .http
                .build_client()
                .context("Failed to create HTTP client")?;

            let token_url = platform
                .token_url
                .as_deref()
                .context("token_url is required for platform authentication")?;
            let token_url =
                Url::parse(token_url).context(format!("Invalid token_url: {token_url}"))?;

            let control_plane_url = platform
                .control_plane_url
                .as_deref()
                .context("control_plane_url is required for platform authentication")?;
            let control_plane = ControlPlaneClient::new(client.clone(), control_plane_url)
                .context(format!("Invalid control_plane_url: {control_plane_url}"))?;

            let exchanger = TokenExchanger::new(
                client,
                token_url,
                platform
                    .client_id
                    .as_deref()
                    .context("client_id is required for platform authentication")?,
                platform
                    .client_secret
                    .as_deref()
                    .context("client_secret is required for platform authentication")?,
            );

            let authenticator = PlatformAuthenticator::new(
                platform.realm.as_str(),
                exchanger,
                control_plane,
                builder.clone(),
            )
            .context("Invalid platform realm")?;
            password_authenticators.push(Arc::new(authenticator));
        }

        let publickey_authenticator = match &auth.publickey.authorized_key {
            Some(line) => {
                let authenticator = StaticKeyAuthenticator::from_openssh(line)
                    .context("Invalid auth.publickey.authorized_key")?;
                Some(Arc::new(authenticator) as Arc<dyn PublicKeyAuthenticator>)
            }
            None => None,
        };

        Ok(Self::new(password_authenticators, publickey_authenticator))
    }

    /// Check if any password strategy is registered.
    pub fn password_enabled(&self) -> bool {
        !self.password_authenticators.is_empty()
    }

    /// Check if public key authentication is enabled.
    pub fn publickey_enabled(&self) -> bool {
        self.publickey_authenticator.is_some()
    }

    /// Realms of the registered password strategies, in dispatch order.
    pub fn realms(&self) -> Vec<&str> {
        self.password_authenticators
            .iter()
            .map(|authenticator| authenticator.realm())
            .collect()
    }

    /// Authenticate a password attempt.
    ///
    /// Returns [`AuthError::InvalidCredentials`] without any external call
    /// when no strategy's pattern matches the username.
    pub async fn authenticate_password(
        &self,
        metadata: &ConnectionMetadata,
        password: &[u8],
    ) -> Result<Permissions, AuthError> {
        let Some(authenticator) = self
            .password_authenticators
            .iter()
            .find(|authenticator| authenticator.user_pattern().is_match(metadata.user()))
        else {
            tracing::debug!(
                user = %metadata.user(),
                remote = %metadata.remote_addr(),
                "No authentication realm matches the username"
            );
            return Err(AuthError::InvalidCredentials);
        };

        tracing::debug!(
            realm = %authenticator.realm(),
            remote = %metadata.remote_addr(),
            "Dispatching password authentication"
        );
        authenticator.authenticate(metadata, password).await
    }

    /// Authenticate a public key attempt.
    pub async fn authenticate_publickey(
        &self,
        metadata: &ConnectionMetadata,
        key: &PublicKey,
    ) -> Result<Permissions, AuthError> {
        match &self.publickey_authenticator {
            Some(authenticator) => authenticator.authenticate(metadata, key).await,
            None => Err(AuthError::InvalidCredentials),
        }
    }

    /// Authenticate one attempt with whichever credential was offered.
    pub async fn authenticate(
        &self,
        metadata: &ConnectionMetadata,
        credential: &Credential,
    ) -> Result<Permissions, AuthError> {
        match credential {
            Credential::Password(password) => {
                self.authenticate_password(metadata, password.as_slice())
                    .await
            }
            Credential::PublicKey(key) => self.authenticate_publickey(metadata, key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use regex::Regex;

    use super::*;
    use crate::server::config::{PlatformAuthConfig, SharedSecretAuthConfig};
    use crate::server::scheduler::{ActualInstance, DesiredWorkload};
    use crate::shared::error::SchedulerError;

    /// Strategy that counts calls and answers with a fixed log guid.
    struct Tagged {
        realm: &'static str,
        pattern: Regex,
        calls: AtomicUsize,
    }

    impl Tagged {
        fn new(realm: &'static str, pattern: &str) -> Arc<Self> {
            Arc::new(Self {
                realm,
                pattern: Regex::new(pattern).unwrap(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PasswordAuthenticator for Tagged {
        fn realm(&self) -> &str {
            self.realm
        }

        fn user_pattern(&self) -> &Regex {
            &self.pattern
        }

        async fn authenticate(
            &self,
            _metadata: &ConnectionMetadata,
            _password: &[u8],
        ) -> Result<Permissions, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::RouteNotFound)
        }
    }

    struct UnreachableScheduler;

    #[async_trait]
    impl Scheduler for UnreachableScheduler {
        async fn actual_instance(
            &self,
            process_guid: &str,
            index: u32,
        ) -> Result<ActualInstance, SchedulerError> {
            Err(SchedulerError::NotFound {
                resource: format!("actual instance {process_guid}/{index}"),
            })
        }

        async fn desired_workload(
            &self,
            process_guid: &str,
        ) -> Result<DesiredWorkload, SchedulerError> {
            Err(SchedulerError::NotFound {
                resource: format!("desired workload {process_guid}"),
            })
        }
    }

    fn metadata(user: &str) -> ConnectionMetadata {
        ConnectionMetadata::new(user, "127.0.0.1:50000".parse().unwrap())
    }

    fn strategies(tagged: &[&Arc<Tagged>]) -> Vec<Arc<dyn PasswordAuthenticator>> {
        tagged
            .iter()
            .map(|strategy| Arc::clone(strategy) as Arc<dyn PasswordAuthenticator>)
            .collect()
    }

    #[tokio::test]
    async fn test_dispatches_to_matching_strategy() {
        let diego = Tagged::new("diego", "^diego:");
        let cf = Tagged::new("cf", "^cf:");
        let composite = CompositeAuthenticator::new(strategies(&[&diego, &cf]), None);

        let err = composite
            .authenticate_password(&metadata("cf:x/0"), b"code")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::RouteNotFound));
        assert_eq!(diego.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cf.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_invalid_credentials() {
        let diego = Tagged::new("diego", "^diego:");
        let composite = CompositeAuthenticator::new(strategies(&[&diego]), None);

        let err = composite
            .authenticate(&metadata("root"), &Credential::password("pw"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(diego.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overlapping_patterns_first_registered_wins() {
        let first = Tagged::new("first", "^shared:");
        let second = Tagged::new("second", "^shared:");
        let composite = CompositeAuthenticator::new(strategies(&[&first, &second]), None);

        for _ in 0..5 {
            let _ = composite
                .authenticate_password(&metadata("shared:x/0"), b"pw")
                .await;
        }

        assert_eq!(first.calls.load(Ordering::SeqCst), 5);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_publickey_without_strategy_is_rejected() {
        let composite = CompositeAuthenticator::new(Vec::new(), None);
        let key = PublicKey::from_openssh(
            "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl",
        )
        .unwrap();

        let err = composite
            .authenticate(&metadata("admin"), &Credential::PublicKey(key))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!composite.publickey_enabled());
        assert!(!composite.password_enabled());
    }

    #[tokio::test]
    async fn test_from_config_registers_in_order() {
        let mut config = ProxyAuthConfig::default();
        config.auth.shared_secret = SharedSecretAuthConfig {
            enabled: true,
            secret: Some("s3cret".to_string()),
            ..Default::default()
        };
        config.auth.platform = PlatformAuthConfig {
            enabled: true,
            control_plane_url: Some("http://127.0.0.1:9".to_string()),
            token_url: Some("http://127.0.0.1:9/oauth/token".to_string()),
            client_id: Some("ssh-proxy".to_string()),
            client_secret: Some("client-secret".to_string()),
            ..Default::default()
        };
        config.auth.publickey.authorized_key = Some(
            "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl"
                .to_string(),
        );

        let composite =
            CompositeAuthenticator::from_config_with_scheduler(&config, Arc::new(UnreachableScheduler))
                .unwrap();

        assert_eq!(composite.realms(), vec!["diego", "cf"]);
        assert!(composite.publickey_enabled());

        let err = composite
            .authenticate_password(&metadata("diego:some-guid/0"), b"s3cret")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Scheduler(SchedulerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_from_config_rejects_missing_secret() {
        let mut config = ProxyAuthConfig::default();
        config.auth.shared_secret.enabled = true;

        let result =
            CompositeAuthenticator::from_config_with_scheduler(&config, Arc::new(UnreachableScheduler));
        assert!(result.is_err());
    }
}

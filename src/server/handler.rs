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

//! SSH handler implementation for the russh server.
//!
//! [`ProxyAuthHandler`] implements the authentication callbacks of
//! `russh::server::Handler` for a single connection, delegating every
//! attempt to the shared [`CompositeAuthenticator`]. The accepted
//! [`Permissions`] stay on the handler for the forwarding layer. Channel
//! callbacks keep the russh defaults.

use std::net::SocketAddr;
use std::sync::Arc;

use russh::keys::ssh_key;
use russh::server::Auth;
use russh::{MethodKind, MethodSet};
use zeroize::Zeroizing;

use super::auth::CompositeAuthenticator;
use crate::shared::auth_types::ConnectionMetadata;
use crate::shared::error::AuthError;
use crate::shared::permissions::Permissions;

/// Default maximum number of authentication attempts per connection.
pub const DEFAULT_MAX_AUTH_ATTEMPTS: u32 = 6;

/// SSH handler for a single client connection.
pub struct ProxyAuthHandler {
    /// Remote address of the connected client.
    peer_addr: SocketAddr,

    /// Shared dispatcher.
    authenticator: Arc<CompositeAuthenticator>,

    /// Username and permissions of the accepted attempt.
    accepted: Option<(String, Permissions)>,

    auth_attempts: u32,
    max_auth_attempts: u32,
}

impl ProxyAuthHandler {
    /// Create a handler for a client connection.
    pub fn new(peer_addr: SocketAddr, authenticator: Arc<CompositeAuthenticator>) -> Self {
        Self {
            peer_addr,
            authenticator,
            accepted: None,
            auth_attempts: 0,
            max_auth_attempts: DEFAULT_MAX_AUTH_ATTEMPTS,
        }
    }

    /// Set the maximum number of authentication attempts.
    pub fn with_max_auth_attempts(mut self, max_auth_attempts: u32) -> Self {
        self.max_auth_attempts = max_auth_attempts;
        self
    }

    /// Get the peer address of the connected client.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Check if the connection is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.accepted.is_some()
    }

    /// Get the authenticated username, if any.
    pub fn username(&self) -> Option<&str> {
        self.accepted.as_ref().map(|(user, _)| user.as_str())
    }

    /// Permissions of the accepted attempt.
    pub fn permissions(&self) -> Option<&Permissions> {
        self.accepted.as_ref().map(|(_, permissions)| permissions)
    }

    /// Take the permissions for the forwarding layer.
    pub fn take_permissions(&mut self) -> Option<Permissions> {
        self.accepted.take().map(|(_, permissions)| permissions)
    }

    /// Build the method set of allowed authentication methods.
    fn allowed_methods(&self) -> MethodSet {
        let mut methods = MethodSet::empty();

        if self.authenticator.publickey_enabled() {
            methods.push(MethodKind::PublicKey);
        }
        if self.authenticator.password_enabled() {
            methods.push(MethodKind::Password);
        }

        methods
    }

    /// Count an attempt. Returns `false` once the limit is exceeded.
    fn register_attempt(&mut self) -> bool {
        self.auth_attempts += 1;
        self.auth_attempts <= self.max_auth_attempts
    }
}

fn reject(methods: Option<MethodSet>) -> Auth {
    Auth::Reject {
        proceed_with_methods: methods.filter(|methods| !methods.is_empty()),
        partial_success: false,
    }
}

/// Record an attempt's outcome and convert it for russh.
fn conclude(
    accepted: &mut Option<(String, Permissions)>,
    user: String,
    peer_addr: SocketAddr,
    result: Result<Permissions, AuthError>,
    methods: MethodSet,
) -> Auth {
    match result {
        Ok(permissions) => {
            tracing::info!(
                user = %user,
                peer = %peer_addr,
                routable = permissions.is_routable(),
                "Authentication accepted"
            );
            *accepted = Some((user, permissions));
            Auth::Accept
        }
        Err(e) if e.is_rejection() => {
            tracing::info!(user = %user, peer = %peer_addr, error = %e, "Authentication rejected");
            reject(Some(methods))
        }
        Err(e) => {
            tracing::warn!(user = %user, peer = %peer_addr, error = %e, "Authentication failed");
            reject(Some(methods))
        }
    }
}

impl russh::server::Handler for ProxyAuthHandler {
    type Error = anyhow::Error;

    /// Handle 'none' authentication.
    ///
    /// Always rejects and advertises available authentication methods.
    fn auth_none(
        &mut self,
        user: &str,
    ) -> impl std::future::Future<Output = Result<Auth, Self::Error>> + Send {
        tracing::debug!(
            user = %user,
            peer = %self.peer_addr,
            "Auth none attempt"
        );

        let methods = self.allowed_methods();
        async move { Ok(reject(Some(methods))) }
    }

    /// Handle public key authentication.
    fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &ssh_key::PublicKey,
    ) -> impl std::future::Future<Output = Result<Auth, Self::Error>> + Send {
        tracing::debug!(
            user = %user,
            peer = %self.peer_addr,
            key_type = %public_key.algorithm(),
            "Public key authentication attempt"
        );

        let within_limit = self.register_attempt();
        let methods = self.allowed_methods();
        let metadata = ConnectionMetadata::new(user, self.peer_addr);
        let key = public_key.clone();
        let authenticator = Arc::clone(&self.authenticator);
        let peer_addr = self.peer_addr;
        let accepted = &mut self.accepted;

        async move {
            if !within_limit {
                tracing::warn!(peer = %peer_addr, "Max authentication attempts exceeded");
                return Ok(reject(None));
            }

            let result = authenticator.authenticate_publickey(&metadata, &key).await;
            Ok(conclude(
                accepted,
                metadata.user().to_string(),
                peer_addr,
                result,
                methods,
            ))
        }
    }

    /// Handle password authentication.
    fn auth_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Auth, Self::Error>> + Send {
        tracing::debug!(
            user = %user,
            peer = %self.peer_addr,
            "Password authentication attempt"
        );

        let within_limit = self.register_attempt();
        let methods = self.allowed_methods();
        let metadata = ConnectionMetadata::new(user, self.peer_addr);
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let authenticator = Arc::clone(&self.authenticator);
        let peer_addr = self.peer_addr;
        let accepted = &mut self.accepted;

        async move {
            if !within_limit {
                tracing::warn!(peer = %peer_addr, "Max authentication attempts exceeded");
                return Ok(reject(None));
            }

            let result = authenticator
                .authenticate_password(&metadata, password.as_slice())
                .await;
            Ok(conclude(
                accepted,
                metadata.user().to_string(),
                peer_addr,
                result,
                methods,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use async_trait::async_trait;
    use russh::server::Handler;

    use super::*;
    use crate::server::auth::{
        PasswordAuthenticator, PermissionsBuilder, PublicKeyAuthenticator,
        SharedSecretAuthenticator, StaticKeyAuthenticator,
    };
    use crate::shared::permissions::{LogMessage, TargetConfig};

    const KEY: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";
    const OTHER_KEY: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

    struct FixedTarget;

    #[async_trait]
    impl PermissionsBuilder for FixedTarget {
        async fn build(
            &self,
            process_guid: &str,
            index: u32,
            _metadata: &ConnectionMetadata,
        ) -> Result<Permissions, AuthError> {
            Ok(Permissions::routed(
                TargetConfig {
                    address: "10.0.0.5:61001".to_string(),
                    host_fingerprint: "fingerprint".to_string(),
                    ..Default::default()
                },
                LogMessage {
                    guid: process_guid.to_string(),
                    message: "Successful remote access by 127.0.0.1:22222".to_string(),
                    index,
                },
            ))
        }
    }

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 22222)
    }

    fn test_authenticator(with_key: bool) -> Arc<CompositeAuthenticator> {
        let shared_secret: Arc<dyn PasswordAuthenticator> = Arc::new(
            SharedSecretAuthenticator::new("diego", "secret", Arc::new(FixedTarget)).unwrap(),
        );
        let publickey = with_key.then(|| {
            Arc::new(StaticKeyAuthenticator::from_openssh(KEY).unwrap())
                as Arc<dyn PublicKeyAuthenticator>
        });
        Arc::new(CompositeAuthenticator::new(vec![shared_secret], publickey))
    }

    #[test]
    fn test_handler_creation() {
        let handler = ProxyAuthHandler::new(test_addr(), test_authenticator(false));

        assert_eq!(handler.peer_addr(), test_addr());
        assert!(!handler.is_authenticated());
        assert!(handler.username().is_none());
        assert!(handler.permissions().is_none());
    }

    #[test]
    fn test_allowed_methods() {
        let handler = ProxyAuthHandler::new(test_addr(), test_authenticator(true));
        let methods = handler.allowed_methods();
        assert!(methods.contains(&MethodKind::Password));
        assert!(methods.contains(&MethodKind::PublicKey));

        let handler = ProxyAuthHandler::new(test_addr(), test_authenticator(false));
        let methods = handler.allowed_methods();
        assert!(methods.contains(&MethodKind::Password));
        assert!(!methods.contains(&MethodKind::PublicKey));
    }

    #[tokio::test]
    async fn test_auth_none_advertises_methods() {
        let mut handler = ProxyAuthHandler::new(test_addr(), test_authenticator(false));

        let auth = handler.auth_none("diego:guid/0").await.unwrap();
        assert!(matches!(
            auth,
            Auth::Reject {
                proceed_with_methods: Some(_),
                partial_success: false
            }
        ));
    }

    #[tokio::test]
    async fn test_password_accept_keeps_permissions() {
        let mut handler = ProxyAuthHandler::new(test_addr(), test_authenticator(false));

        let auth = handler
            .auth_password("diego:app-guid/2", "secret")
            .await
            .unwrap();
        assert!(matches!(auth, Auth::Accept));
        assert!(handler.is_authenticated());
        assert_eq!(handler.username(), Some("diego:app-guid/2"));

        let permissions = handler.take_permissions().unwrap();
        assert_eq!(permissions.target.unwrap().address, "10.0.0.5:61001");
        assert_eq!(permissions.log_message.unwrap().index, 2);
        assert!(handler.permissions().is_none());
    }

    #[tokio::test]
    async fn test_password_reject() {
        let mut handler = ProxyAuthHandler::new(test_addr(), test_authenticator(false));

        let auth = handler
            .auth_password("diego:app-guid/2", "wrong")
            .await
            .unwrap();
        assert!(matches!(auth, Auth::Reject { .. }));
        assert!(!handler.is_authenticated());
    }

    #[tokio::test]
    async fn test_publickey_accept_and_reject() {
        let mut handler = ProxyAuthHandler::new(test_addr(), test_authenticator(true));

        let other = ssh_key::PublicKey::from_openssh(OTHER_KEY).unwrap();
        let auth = handler.auth_publickey("admin", &other).await.unwrap();
        assert!(matches!(auth, Auth::Reject { .. }));

        let key = ssh_key::PublicKey::from_openssh(KEY).unwrap();
        let auth = handler.auth_publickey("admin", &key).await.unwrap();
        assert!(matches!(auth, Auth::Accept));
        assert_eq!(handler.permissions(), Some(&Permissions::empty()));
    }

    #[tokio::test]
    async fn test_attempt_limit() {
        let mut handler = ProxyAuthHandler::new(test_addr(), test_authenticator(false))
            .with_max_auth_attempts(1);

        let auth = handler
            .auth_password("diego:app-guid/0", "wrong")
            .await
            .unwrap();
        assert!(matches!(auth, Auth::Reject { .. }));

        let auth = handler
            .auth_password("diego:app-guid/0", "secret")
            .await
            .unwrap();
        assert!(matches!(
            auth,
            Auth::Reject {
                proceed_with_methods: None,
                ..
            }
        ));
        assert!(!handler.is_authenticated());
    }
}

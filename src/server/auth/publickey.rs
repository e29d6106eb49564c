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

//! Public key authentication against one configured key.
//!
//! The key is configured as a single OpenSSH public key line:
//!
//! ```text
//! ssh-ed25519 AAAAC3NzaC1lZDI1NTE5... operator@host
//! ```
//!
//! An offered key is accepted when its wire encoding equals the configured
//! key's wire encoding. The comment is ignored. A successful attempt yields
//! empty [`Permissions`]: this path is administrative and carries no
//! forwarding target.

use async_trait::async_trait;
use russh::keys::ssh_key::{self, PublicKey};

use super::provider::PublicKeyAuthenticator;
use crate::shared::auth_types::ConnectionMetadata;
use crate::shared::error::AuthError;
use crate::shared::permissions::Permissions;

/// [`PublicKeyAuthenticator`] accepting exactly one key.
#[derive(Debug, Clone)]
pub struct StaticKeyAuthenticator {
    authorized_key: Vec<u8>,
    algorithm: String,
}

impl StaticKeyAuthenticator {
    /// Create the strategy from an already parsed key.
    pub fn new(key: &PublicKey) -> Result<Self, ssh_key::Error> {
        Ok(Self {
            authorized_key: key.to_bytes()?,
            algorithm: key.algorithm().to_string(),
        })
    }

    /// Create the strategy from an OpenSSH public key line.
    pub fn from_openssh(line: &str) -> Result<Self, ssh_key::Error> {
        Self::new(&PublicKey::from_openssh(line.trim())?)
    }
}

#[async_trait]
impl PublicKeyAuthenticator for StaticKeyAuthenticator {
    async fn authenticate(
        &self,
        metadata: &ConnectionMetadata,
        key: &PublicKey,
    ) -> Result<Permissions, AuthError> {
        let matches = key
            .to_bytes()
            .map(|offered| offered == self.authorized_key)
            .unwrap_or(false);

        if !matches {
            tracing::debug!(
                user = %metadata.user(),
                remote = %metadata.remote_addr(),
                key_type = %key.algorithm(),
                "Offered public key does not match the authorized key"
            );
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(
            user = %metadata.user(),
            remote = %metadata.remote_addr(),
            key_type = %self.algorithm,
            "Public key authentication successful"
        );
        Ok(Permissions::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORIZED: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl operator@host";
    const OTHER: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl other@host";

    fn metadata() -> ConnectionMetadata {
        ConnectionMetadata::new("admin", "10.0.0.1:40000".parse().unwrap())
    }

    #[tokio::test]
    async fn test_matching_key_yields_empty_permissions() {
        let auth = StaticKeyAuthenticator::from_openssh(AUTHORIZED).unwrap();
        let offered = PublicKey::from_openssh(AUTHORIZED).unwrap();

        let permissions = auth.authenticate(&metadata(), &offered).await.unwrap();
        assert_eq!(permissions, Permissions::empty());
    }

    #[tokio::test]
    async fn test_comment_is_ignored() {
        let auth = StaticKeyAuthenticator::from_openssh(AUTHORIZED).unwrap();
        let without_comment = AUTHORIZED.trim_end_matches(" operator@host");
        let offered = PublicKey::from_openssh(without_comment).unwrap();

        assert!(auth.authenticate(&metadata(), &offered).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_key_is_rejected() {
        let auth = StaticKeyAuthenticator::from_openssh(AUTHORIZED).unwrap();
        let offered = PublicKey::from_openssh(OTHER).unwrap();

        let err = auth.authenticate(&metadata(), &offered).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_invalid_key_line() {
        assert!(StaticKeyAuthenticator::from_openssh("ssh-ed25519 not-base64").is_err());
        assert!(StaticKeyAuthenticator::from_openssh("").is_err());
    }

    #[test]
    fn test_new_from_parsed_key() {
        let key = PublicKey::from_openssh(AUTHORIZED).unwrap();
        let from_key = StaticKeyAuthenticator::new(&key).unwrap();
        let from_line = StaticKeyAuthenticator::from_openssh(AUTHORIZED).unwrap();

        assert_eq!(from_key.authorized_key, from_line.authorized_key);
        assert_eq!(from_key.algorithm, "ssh-ed25519");
    }
}

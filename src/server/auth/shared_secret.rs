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

//! Shared-secret authentication for proxy-internal callers.
//!
//! Usernames take the form `<realm>:<process-guid>/<index>` (realm `diego`
//! by default) and the password must equal a pre-shared secret. No network
//! call is made before the secret matches.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::provider::{realm_user_pattern, PasswordAuthenticator};
use super::resolver::PermissionsBuilder;
use crate::shared::auth_types::ConnectionMetadata;
use crate::shared::error::AuthError;
use crate::shared::permissions::Permissions;

/// Default realm of the shared-secret strategy.
pub const DEFAULT_REALM: &str = "diego";

/// Password strategy checking a pre-shared secret.
pub struct SharedSecretAuthenticator {
    realm: String,
    pattern: Regex,
    secret: Zeroizing<Vec<u8>>,
    builder: Arc<dyn PermissionsBuilder>,
}

impl SharedSecretAuthenticator {
    /// Create the strategy for `realm`.
    pub fn new(
        realm: impl Into<String>,
        secret: impl AsRef<[u8]>,
        builder: Arc<dyn PermissionsBuilder>,
    ) -> Result<Self, regex::Error> {
        let realm = realm.into();
        let pattern = realm_user_pattern(&realm, r"(.+)/([0-9]+)")?;

        Ok(Self {
            realm,
            pattern,
            secret: Zeroizing::new(secret.as_ref().to_vec()),
            builder,
        })
    }
}

impl std::fmt::Debug for SharedSecretAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretAuthenticator")
            .field("realm", &self.realm)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PasswordAuthenticator for SharedSecretAuthenticator {
    fn realm(&self) -> &str {
        &self.realm
    }

    fn user_pattern(&self) -> &Regex {
        &self.pattern
    }

    async fn authenticate(
        &self,
        metadata: &ConnectionMetadata,
        password: &[u8],
    ) -> Result<Permissions, AuthError> {
        let Some(captures) = self.pattern.captures(metadata.user()) else {
            return Err(AuthError::InvalidDomain);
        };

        if !bool::from(password.ct_eq(self.secret.as_slice())) {
            tracing::info!(
                realm = %self.realm,
                remote = %metadata.remote_addr(),
                "Shared secret authentication failed"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let process_guid = &captures[1];
        let index: u32 = captures[2].parse()?;

        tracing::debug!(
            process_guid = %process_guid,
            index = index,
            remote = %metadata.remote_addr(),
            "Shared secret accepted, resolving permissions"
        );

        self.builder.build(process_guid, index, metadata).await
    }
}

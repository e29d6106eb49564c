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

//! Platform user authentication via token exchange.
//!
//! Usernames take the form `<realm>:<app-guid>/<index>` (realm `cf` by
//! default, app guid a UUID in either case) and the password is a one-time
//! authorization code.
//!
//! # Flow
//!
//! 1. Parse the username; any failure is [`AuthError::InvalidCredentials`]
//! 2. Exchange the code for a bearer token ([`TokenExchanger`])
//! 3. Read audit claims from the token payload, best effort
//! 4. Ask the control plane whether the token holder may reach the instance
//!    ([`ControlPlaneClient`]); the answer names the process guid
//! 5. Resolve permissions for that process guid and index

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::control_plane::ControlPlaneClient;
use super::identity::{TokenClaims, TokenExchanger};
use super::provider::{realm_user_pattern, PasswordAuthenticator};
use super::resolver::PermissionsBuilder;
use crate::shared::auth_types::ConnectionMetadata;
use crate::shared::error::AuthError;
use crate::shared::permissions::Permissions;

/// Default realm of the platform strategy.
pub const DEFAULT_REALM: &str = "cf";

const APP_GUID_INDEX: &str = "([a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12})/([0-9]+)";

/// Password strategy backed by the identity provider and control plane.
pub struct PlatformAuthenticator {
    realm: String,
    pattern: Regex,
    exchanger: TokenExchanger,
    control_plane: ControlPlaneClient,
    builder: Arc<dyn PermissionsBuilder>,
}

impl PlatformAuthenticator {
    pub fn new(
        realm: impl Into<String>,
        exchanger: TokenExchanger,
        control_plane: ControlPlaneClient,
        builder: Arc<dyn PermissionsBuilder>,
    ) -> Result<Self, regex::Error> {
        let realm = realm.into();
        let pattern = realm_user_pattern(&realm, APP_GUID_INDEX)?;

        Ok(Self {
            realm,
            pattern,
            exchanger,
            control_plane,
            builder,
        })
    }

    fn parse_user<'a>(&self, user: &'a str) -> Result<(&'a str, u32), AuthError> {
        let captures = self
            .pattern
            .captures(user)
            .ok_or(AuthError::InvalidCredentials)?;

        let (Some(app_guid), Some(index)) = (captures.get(1), captures.get(2)) else {
            return Err(AuthError::InvalidCredentials);
        };
        let index = index
            .as_str()
            .parse()
            .map_err(|_| AuthError::InvalidCredentials)?;

        Ok((app_guid.as_str(), index))
    }
}

#[async_trait]
impl PasswordAuthenticator for PlatformAuthenticator {
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
        let (app_guid, index) = self.parse_user(metadata.user())?;
        let app = format!("{app_guid}/{index}");

        let token = self.exchanger.exchange(password).await.map_err(|e| {
            tracing::info!(
                app = %app,
                remote = %metadata.remote_addr(),
                "Token exchange failed"
            );
            e
        })?;

        let claims = TokenClaims::decode_unverified(token.access_token()).unwrap_or_else(|| {
            tracing::debug!(app = %app, "Access token payload is not readable, audit fields left empty");
            TokenClaims::default()
        });

        let access = match self.control_plane.ssh_access(app_guid, index, &token).await {
            Ok(access) => access,
            Err(e) => {
                tracing::warn!(
                    app = %app,
                    principal = %claims.principal(),
                    username = %claims.username(),
                    error = %e,
                    "fetching-app-failed"
                );
                return Err(e);
            }
        };

        let permissions = self
            .builder
            .build(&access.process_guid, index, metadata)
            .await?;

        tracing::info!(
            app = %app,
            principal = %claims.principal(),
            username = %claims.username(),
            remote = %metadata.remote_addr(),
            "app-access-success"
        );

        Ok(permissions)
    }
}

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

//! Authentication strategy traits.
//!
//! Every strategy is:
//!
//! - **Async**: network-bound strategies suspend on HTTP calls
//! - **Thread-safe**: `Send + Sync`, shared by all connection tasks
//! - **Total**: each call ends in exactly one of `Ok(Permissions)` or
//!   `Err(AuthError)`
//!
//! # Implementing a password strategy
//!
//! ```ignore
//! use async_trait::async_trait;
//! use regex::Regex;
//! use ssh_proxy_auth::server::auth::PasswordAuthenticator;
//! use ssh_proxy_auth::shared::{AuthError, ConnectionMetadata, Permissions};
//!
//! struct DenyAll {
//!     pattern: Regex,
//! }
//!
//! #[async_trait]
//! impl PasswordAuthenticator for DenyAll {
//!     fn realm(&self) -> &str {
//!         "deny"
//!     }
//!
//!     fn user_pattern(&self) -> &Regex {
//!         &self.pattern
//!     }
//!
//!     async fn authenticate(
//!         &self,
//!         _metadata: &ConnectionMetadata,
//!         _password: &[u8],
//!     ) -> Result<Permissions, AuthError> {
//!         Err(AuthError::InvalidCredentials)
//!     }
//! }
//! ```

use async_trait::async_trait;
use regex::Regex;
use russh::keys::ssh_key::PublicKey;

use crate::shared::auth_types::ConnectionMetadata;
use crate::shared::error::AuthError;
use crate::shared::permissions::Permissions;

/// A password-based strategy selected by the username's realm.
#[async_trait]
pub trait PasswordAuthenticator: Send + Sync {
    /// Realm name, used for logging.
    fn realm(&self) -> &str;

    /// Pattern a username must match for this strategy to be selected.
    ///
    /// Patterns of strategies registered together must be mutually
    /// exclusive.
    fn user_pattern(&self) -> &Regex;

    /// Authenticate one attempt.
    ///
    /// # Security
    ///
    /// Implementations must never log the password.
    async fn authenticate(
        &self,
        metadata: &ConnectionMetadata,
        password: &[u8],
    ) -> Result<Permissions, AuthError>;
}

/// Compile an anchored `^<realm>:<body>$` username pattern.
///
/// The realm is matched literally.
pub fn realm_user_pattern(realm: &str, body: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^{}:{}$", regex::escape(realm), body))
}

/// A public-key strategy.
#[async_trait]
pub trait PublicKeyAuthenticator: Send + Sync {
    /// Authenticate one attempt with an offered public key.
    async fn authenticate(
        &self,
        metadata: &ConnectionMetadata,
        key: &PublicKey,
    ) -> Result<Permissions, AuthError>;
}

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

//! Per-attempt authentication inputs.
//!
//! The SSH server hands every authentication attempt to this crate as a
//! [`ConnectionMetadata`] plus exactly one [`Credential`].
//!
//! # Types
//!
//! - [`ConnectionMetadata`]: Username and remote address of the attempt
//! - [`Credential`]: The password or public key offered by the client

use std::fmt;
use std::net::SocketAddr;

use russh::keys::ssh_key::PublicKey;
use zeroize::Zeroizing;

/// Immutable facts about one connection attempt.
///
/// # Examples
///
/// ```
/// use ssh_proxy_auth::shared::auth_types::ConnectionMetadata;
///
/// let metadata = ConnectionMetadata::new("diego:some-guid/0", "10.0.0.1:52000".parse().unwrap());
/// assert_eq!(metadata.user(), "diego:some-guid/0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetadata {
    user: String,
    remote_addr: SocketAddr,
}

impl ConnectionMetadata {
    /// Create metadata for a connection attempt.
    pub fn new(user: impl Into<String>, remote_addr: SocketAddr) -> Self {
        Self {
            user: user.into(),
            remote_addr,
        }
    }

    /// The raw SSH username, including its realm prefix.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The remote network address of the client.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

/// A credential offered by the client.
///
/// Exactly one is present per authentication attempt.
pub enum Credential {
    /// Raw password bytes. Wiped from memory on drop.
    Password(Zeroizing<Vec<u8>>),

    /// An offered public key.
    PublicKey(PublicKey),
}

impl Credential {
    /// Build a password credential.
    pub fn password(password: impl AsRef<[u8]>) -> Self {
        Credential::Password(Zeroizing::new(password.as_ref().to_vec()))
    }

    /// The SSH method name carrying this credential.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Password(_) => auth_method_names::PASSWORD,
            Credential::PublicKey(_) => auth_method_names::PUBLICKEY,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::PublicKey(key) => f
                .debug_tuple("PublicKey")
                .field(&key.algorithm().as_str())
                .finish(),
        }
    }
}

/// SSH authentication method identifiers (RFC 4252).
pub mod auth_method_names {
    /// Password authentication
    pub const PASSWORD: &str = "password";

    /// Public key authentication
    pub const PUBLICKEY: &str = "publickey";
}

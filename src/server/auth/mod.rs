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

//! Authentication strategies for the SSH proxy.
//!
//! This module decides whether an incoming SSH connection may proceed and,
//! if so, which workload instance it should be forwarded to.
//!
//! # Architecture
//!
//! The [`CompositeAuthenticator`] is the single entry point. It routes each
//! attempt to one strategy:
//!
//! - **Shared secret** ([`SharedSecretAuthenticator`]): `diego:<process-guid>/<index>`
//!   with a pre-shared password, for proxy-internal callers
//! - **Platform** ([`PlatformAuthenticator`]): `cf:<app-guid>/<index>` with a
//!   one-time code exchanged at the identity provider, then checked against
//!   the control plane
//! - **Public key** ([`StaticKeyAuthenticator`]): one configured key, for
//!   administrative access
//!
//! Password strategies that identify a workload instance hand it to a
//! [`PermissionsBuilder`]; the [`PermissionResolver`] asks the scheduler where
//! the instance runs and builds the forwarding [`Permissions`].
//!
//! # Security
//!
//! - Credential rejections are reported as uninformative errors
//! - Passwords, tokens and private keys are never logged
//! - Secrets are held in `zeroize` buffers and wiped on drop
//! - Token claims are read for audit fields only and never trusted
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ssh_proxy_auth::server::auth::{
//!     CompositeAuthenticator, PasswordAuthenticator, PermissionResolver,
//!     SharedSecretAuthenticator,
//! };
//! use ssh_proxy_auth::server::scheduler::HttpScheduler;
//!
//! # fn example() -> anyhow::Result<()> {
//! let scheduler = HttpScheduler::new("http://127.0.0.1:8889", Duration::from_secs(10))?;
//! let resolver = Arc::new(PermissionResolver::new(Arc::new(scheduler)));
//! let shared_secret = SharedSecretAuthenticator::new("diego", "proxy-secret", resolver)?;
//!
//! let strategies: Vec<Arc<dyn PasswordAuthenticator>> = vec![Arc::new(shared_secret)];
//! let authenticator = CompositeAuthenticator::new(strategies, None);
//! # Ok(())
//! # }
//! ```
//!
//! [`Permissions`]: crate::shared::permissions::Permissions

pub mod composite;
pub mod control_plane;
pub mod identity;
pub mod platform;
pub mod provider;
pub mod publickey;
pub mod resolver;
pub mod shared_secret;

pub use composite::CompositeAuthenticator;
pub use control_plane::{ControlPlaneClient, SshAccess};
pub use identity::{BearerToken, TokenClaims, TokenExchanger};
pub use platform::PlatformAuthenticator;
pub use provider::{realm_user_pattern, PasswordAuthenticator, PublicKeyAuthenticator};
pub use publickey::StaticKeyAuthenticator;
pub use resolver::{PermissionResolver, PermissionsBuilder};
pub use shared_secret::SharedSecretAuthenticator;

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::PermissionsBuilder;
    use crate::shared::auth_types::ConnectionMetadata;
    use crate::shared::error::AuthError;
    use crate::shared::permissions::Permissions;

    /// Builder that records its inputs and answers with empty permissions,
    /// or fails with `RouteNotFound`.
    #[derive(Default)]
    pub(crate) struct RecordingBuilder {
        fail: bool,
        calls: Mutex<Vec<(String, u32)>>,
    }

    impl RecordingBuilder {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<(String, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PermissionsBuilder for RecordingBuilder {
        async fn build(
            &self,
            process_guid: &str,
            index: u32,
            _metadata: &ConnectionMetadata,
        ) -> Result<Permissions, AuthError> {
            self.calls
                .lock()
                .unwrap()
                .push((process_guid.to_string(), index));
            if self.fail {
                Err(AuthError::RouteNotFound)
            } else {
                Ok(Permissions::empty())
            }
        }
    }
}

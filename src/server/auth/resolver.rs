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

//! Permission resolution.
//!
//! Once a strategy knows which workload instance the client may reach, the
//! [`PermissionResolver`] turns `(process_guid, index)` into a forwarding
//! target by asking the scheduler for the instance's placement and the
//! workload's SSH route.
//!
//! # Resolution
//!
//! 1. Fetch the actual instance (errors propagate unchanged)
//! 2. Fetch the desired workload (errors propagate unchanged)
//! 3. Extract the SSH route ([`AuthError::RouteNotFound`] if absent)
//! 4. Find the host port mapped to the route's container port. If there is
//!    none, return empty [`Permissions`] without error: the client is
//!    authorized but the instance is not routable yet.
//! 5. Build the target config and the audit record

use std::sync::Arc;

use async_trait::async_trait;

use crate::server::scheduler::{Scheduler, SshRoute};
use crate::shared::auth_types::ConnectionMetadata;
use crate::shared::error::AuthError;
use crate::shared::permissions::{LogMessage, Permissions, TargetConfig};

/// Builds permissions for an authorized workload instance.
#[async_trait]
pub trait PermissionsBuilder: Send + Sync {
    async fn build(
        &self,
        process_guid: &str,
        index: u32,
        metadata: &ConnectionMetadata,
    ) -> Result<Permissions, AuthError>;
}

/// [`PermissionsBuilder`] backed by scheduler lookups.
pub struct PermissionResolver {
    scheduler: Arc<dyn Scheduler>,
}

impl PermissionResolver {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl PermissionsBuilder for PermissionResolver {
    async fn build(
        &self,
        process_guid: &str,
        index: u32,
        metadata: &ConnectionMetadata,
    ) -> Result<Permissions, AuthError> {
        let actual = self.scheduler.actual_instance(process_guid, index).await?;
        let desired = self.scheduler.desired_workload(process_guid).await?;
        let route = SshRoute::from_desired(&desired)?;

        let Some(host_port) = actual.host_port_for(route.container_port) else {
            tracing::warn!(
                process_guid = %process_guid,
                index = index,
                container_port = route.container_port,
                remote = %metadata.remote_addr(),
                "No host port mapped for ssh container port, instance not routable"
            );
            return Ok(Permissions::empty());
        };

        let target = TargetConfig {
            address: format!("{}:{}", actual.address, host_port),
            host_fingerprint: route.host_fingerprint,
            user: route.user,
            password: route.password,
            private_key: Some(route.private_key).filter(|key| !key.is_empty()),
        };

        let log_message = LogMessage {
            guid: desired.log_guid,
            message: format!("Successful remote access by {}", metadata.remote_addr()),
            index,
        };

        tracing::debug!(
            process_guid = %process_guid,
            index = index,
            target = %target.address,
            "Resolved forwarding target"
        );

        Ok(Permissions::routed(target, log_message))
    }
}

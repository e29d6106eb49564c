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

//! Scheduler lookups used to locate workload instances.
//!
//! The permission resolver needs two read-only answers from the scheduler:
//!
//! - the **desired** workload, which carries the SSH routing metadata
//!   ([`SshRoute`]) under the [`SSH_ROUTE_TAG`] key, and
//! - the **actual** placement of one instance: host address plus
//!   container-to-host port mappings.
//!
//! [`Scheduler`] abstracts both lookups; [`HttpScheduler`] talks to the
//! scheduler API over HTTP.

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::{AuthError, SchedulerError};

pub use http::HttpScheduler;

/// Routing-metadata key holding the SSH route of a desired workload.
pub const SSH_ROUTE_TAG: &str = "diego-ssh";

/// Read-only scheduler queries.
///
/// Implementations must be safe to call concurrently and must bound every
/// request with a timeout.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Observed placement of one instance of a workload.
    async fn actual_instance(
        &self,
        process_guid: &str,
        index: u32,
    ) -> Result<ActualInstance, SchedulerError>;

    /// Declared target state of a workload.
    async fn desired_workload(&self, process_guid: &str)
        -> Result<DesiredWorkload, SchedulerError>;
}

/// The scheduler's declared intent for a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DesiredWorkload {
    pub process_guid: String,

    /// Identifier used for the workload's log stream.
    #[serde(default)]
    pub log_guid: String,

    /// Routing metadata keyed by route type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<HashMap<String, serde_json::Value>>,
}

/// Lifecycle state of an actual instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceState {
    #[default]
    Unclaimed,
    Claimed,
    Running,
    Crashed,
}

/// A container-side port exposed on a host-side port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u32,
    pub host_port: u32,
}

/// The scheduler's observed placement of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActualInstance {
    pub process_guid: String,
    pub index: u32,

    #[serde(default)]
    pub state: InstanceState,

    /// Host network address. Empty until the instance is placed.
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

impl ActualInstance {
    /// Host port mapped to `container_port`, if any.
    pub fn host_port_for(&self, container_port: u32) -> Option<u32> {
        self.ports
            .iter()
            .find(|mapping| mapping.container_port == container_port)
            .map(|mapping| mapping.host_port)
    }
}

/// SSH routing metadata placed on a desired workload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshRoute {
    pub container_port: u32,

    #[serde(default)]
    pub host_fingerprint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub private_key: String,
}

impl std::fmt::Debug for SshRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshRoute")
            .field("container_port", &self.container_port)
            .field("host_fingerprint", &self.host_fingerprint)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl SshRoute {
    /// Extract the SSH route from a desired workload.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RouteNotFound`] if there is no routing metadata or no
    ///   entry under [`SSH_ROUTE_TAG`]
    /// - [`AuthError::MalformedRoute`] if the entry does not decode
    pub fn from_desired(desired: &DesiredWorkload) -> Result<Self, AuthError> {
        let raw = desired
            .routes
            .as_ref()
            .and_then(|routes| routes.get(SSH_ROUTE_TAG))
            .ok_or(AuthError::RouteNotFound)?;

        SshRoute::deserialize(raw).map_err(AuthError::MalformedRoute)
    }
}

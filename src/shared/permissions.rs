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

//! Permissions handed back to the SSH server after a successful attempt.
//!
//! [`Permissions`] is typed: an optional [`TargetConfig`] telling the
//! forwarding layer where and how to connect, and an optional
//! [`LogMessage`] audit record. The forwarding layer reads them as JSON
//! strings under named critical options, so [`Permissions::critical_options`]
//! and [`Permissions::from_critical_options`] keep that wire shape.
//!
//! A `Permissions` without a target is a valid success: the client is
//! authenticated and authorized, but the instance has no live endpoint yet.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Critical option carrying the JSON-encoded [`TargetConfig`].
pub const PROXY_TARGET_CONFIG_OPTION: &str = "proxy-target-config";

/// Critical option carrying the JSON-encoded [`LogMessage`].
pub const LOG_MESSAGE_OPTION: &str = "log-message";

/// Where and how the forwarding layer reaches the workload instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TargetConfig {
    /// `host:port` of the instance's SSH daemon.
    pub address: String,

    /// Expected host key fingerprint of the daemon.
    #[serde(default)]
    pub host_fingerprint: String,

    /// Username for the daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password for the daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// PEM private key for the daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("address", &self.address)
            .field("host_fingerprint", &self.host_fingerprint)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Audit record emitted on behalf of the workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Log identifier of the workload.
    pub guid: String,

    /// Human-readable access message.
    pub message: String,

    /// Instance index that was accessed.
    pub index: u32,
}

/// The outcome of a successful authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Permissions {
    /// Forwarding target, absent when the instance is not routable yet.
    pub target: Option<TargetConfig>,

    /// Audit record, absent for strategies that resolve no workload.
    pub log_message: Option<LogMessage>,
}

impl Permissions {
    /// Permissions with no critical options at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Permissions with a forwarding target and an audit record.
    pub fn routed(target: TargetConfig, log_message: LogMessage) -> Self {
        Self {
            target: Some(target),
            log_message: Some(log_message),
        }
    }

    /// Returns `true` if a forwarding target is present.
    pub fn is_routable(&self) -> bool {
        self.target.is_some()
    }

    /// Encode as named critical options holding JSON strings.
    ///
    /// Absent parts produce no entry.
    pub fn critical_options(&self) -> Result<BTreeMap<String, String>, AuthError> {
        let mut options = BTreeMap::new();

        if let Some(ref target) = self.target {
            let json = serde_json::to_string(target).map_err(AuthError::Encoding)?;
            options.insert(PROXY_TARGET_CONFIG_OPTION.to_string(), json);
        }

        if let Some(ref log_message) = self.log_message {
            let json = serde_json::to_string(log_message).map_err(AuthError::Encoding)?;
            options.insert(LOG_MESSAGE_OPTION.to_string(), json);
        }

        Ok(options)
    }

    /// Decode permissions from named critical options.
    ///
    /// Unknown options are ignored.
    pub fn from_critical_options(
        options: &BTreeMap<String, String>,
    ) -> Result<Self, serde_json::Error> {
        let target = options
            .get(PROXY_TARGET_CONFIG_OPTION)
            .map(|json| serde_json::from_str(json))
            .transpose()?;
        let log_message = options
            .get(LOG_MESSAGE_OPTION)
            .map(|json| serde_json::from_str(json))
            .transpose()?;

        Ok(Self {
            target,
            log_message,
        })
    }
}

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

//! Types shared between the SSH server seam and the authentication core.
//!
//! # Modules
//!
//! - [`auth_types`]: Per-attempt inputs (metadata and credential)
//! - [`permissions`]: The typed result handed back to the SSH server
//! - [`error`]: Authentication and scheduler error types

pub mod auth_types;
pub mod error;
pub mod permissions;

pub use auth_types::{ConnectionMetadata, Credential};
pub use error::{AuthError, SchedulerError};
pub use permissions::{
    LogMessage, Permissions, TargetConfig, LOG_MESSAGE_OPTION, PROXY_TARGET_CONFIG_OPTION,
};

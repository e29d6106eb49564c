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

//! Error types for authentication and permission resolution.
//!
//! # Error Categories
//!
//! - [`AuthError`]: Every way an authentication attempt can end in failure
//! - [`SchedulerError`]: Failures of the scheduler lookups, carried verbatim
//!   inside [`AuthError::Scheduler`]
//!
//! The credential-rejected family (`InvalidCredentials`, `InvalidDomain`,
//! `AuthenticationFailed`) is deliberately uninformative. Display strings
//! never contain tokens, passwords or key material.

use std::num::ParseIntError;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by an authentication attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username pattern mismatch, wrong password or key, malformed index.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Username does not belong to the strategy's realm.
    #[error("invalid authentication domain")]
    InvalidDomain,

    /// The identity provider token exchange failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The control plane refused the access check.
    #[error("fetching app failed: control plane returned {status}")]
    FetchAppFailed { status: StatusCode },

    /// The control plane access check body could not be decoded.
    #[error("invalid control plane response")]
    InvalidControlPlaneResponse(#[source] serde_json::Error),

    /// The desired workload carries no SSH routing metadata.
    #[error("ssh route not found")]
    RouteNotFound,

    /// The SSH routing metadata is present but malformed.
    #[error("malformed ssh route")]
    MalformedRoute(#[source] serde_json::Error),

    /// The instance index in the username is not a valid integer.
    #[error("invalid instance index")]
    InvalidInstanceIndex(#[from] ParseIntError),

    /// A scheduler lookup failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// An outbound HTTP request failed or timed out.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// An endpoint URL could not be built.
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Permissions could not be serialized.
    #[error("failed to encode permissions")]
    Encoding(#[source] serde_json::Error),
}

impl AuthError {
    /// Returns `true` when the client's credentials were rejected, as
    /// opposed to a backend or configuration failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::InvalidDomain
                | AuthError::AuthenticationFailed
        )
    }
}

/// Errors returned by the scheduler lookups.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The requested workload or instance does not exist.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The scheduler answered with an application error.
    #[error("scheduler error {kind}: {message}")]
    Api { kind: String, message: String },

    /// The scheduler answered with an unexpected HTTP status.
    #[error("scheduler returned unexpected status {status}")]
    UnexpectedStatus { status: StatusCode },

    /// The request to the scheduler failed or timed out.
    #[error("scheduler request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The scheduler response could not be decoded.
    #[error("failed to decode scheduler response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The scheduler endpoint URL could not be built.
    #[error("invalid scheduler address: {0}")]
    InvalidAddress(#[from] url::ParseError),
}

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

//! Control plane SSH access check.

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::identity::BearerToken;
use crate::server::scheduler::http::parse_base_url;
use crate::shared::error::AuthError;

/// Answer of the access check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SshAccess {
    /// Workload identifier to resolve through the scheduler.
    pub process_guid: String,
}

/// Client for the control plane's internal access-check endpoint.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ControlPlaneClient {
    /// Create a client for the control plane at `base_url`.
    ///
    /// `client` must carry a request timeout.
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Ask whether the token holder may reach `app_guid/index`.
    ///
    /// Issues `GET /internal/apps/{app_guid}/ssh_access/{index}`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::FetchAppFailed`] on any status other than 200
    /// - [`AuthError::InvalidControlPlaneResponse`] if the body does not decode
    /// - [`AuthError::Transport`] on connection failure or timeout
    /// - [`AuthError::InvalidEndpoint`] if the request URL cannot be built
    pub async fn ssh_access(
        &self,
        app_guid: &str,
        index: u32,
        token: &BearerToken,
    ) -> Result<SshAccess, AuthError> {
        let url = self
            .base_url
            .join(&format!("internal/apps/{app_guid}/ssh_access/{index}"))?;

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, token.authorization())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::FetchAppFailed { status });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(AuthError::InvalidControlPlaneResponse)
    }
}

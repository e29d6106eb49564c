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

//! Identity provider token exchange.
//!
//! The platform strategy treats the SSH password as a one-time authorization
//! code. [`TokenExchanger`] trades it for a bearer token at the identity
//! provider's token endpoint:
//!
//! ```text
//! POST <token_url>
//! Authorization: Basic <client_id:client_secret>
//! Accept: application/json
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=authorization_code&code=<one-time code>
//! ```
//!
//! # Trust
//!
//! Trust in the token comes only from the exchange succeeding. The claims
//! read by [`TokenClaims::decode_unverified`] are not signature-checked and
//! are used for audit log fields, never for a decision.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::shared::error::AuthError;

/// JWT segments are base64url; some issuers keep the padding.
const JWT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Exchanges one-time authorization codes for bearer tokens.
pub struct TokenExchanger {
    client: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: Zeroizing<String>,
}

impl TokenExchanger {
    /// Create an exchanger for `token_url`.
    ///
    /// `client` must carry a request timeout.
    pub fn new(
        client: reqwest::Client,
        token_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url,
            client_id: client_id.into(),
            client_secret: Zeroizing::new(client_secret.into()),
        }
    }

    /// The token endpoint.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Exchange `code` for a bearer token.
    ///
    /// # Errors
    ///
    /// Every failure (transport, non-200 status, undecodable body) collapses
    /// into [`AuthError::AuthenticationFailed`]. The cause is logged at
    /// debug level without the code or the token.
    pub async fn exchange(&self, code: &[u8]) -> Result<BearerToken, AuthError> {
        let Ok(code) = std::str::from_utf8(code) else {
            tracing::debug!("One-time code is not valid UTF-8");
            return Err(AuthError::AuthenticationFailed);
        };

        let form = [("grant_type", "authorization_code"), ("code", code)];
        let response = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(self.client_secret.as_str()))
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Token exchange request failed");
                AuthError::AuthenticationFailed
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(status = %status, "Token endpoint rejected the code");
            return Err(AuthError::AuthenticationFailed);
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::debug!(error = %e, "Failed to read token response");
            AuthError::AuthenticationFailed
        })?;

        let token: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode token response");
            AuthError::AuthenticationFailed
        })?;

        Ok(BearerToken::new(token.token_type, token.access_token))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
}

/// A bearer credential returned by the identity provider.
pub struct BearerToken {
    token_type: String,
    access_token: Zeroizing<String>,
}

impl BearerToken {
    pub fn new(token_type: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            token_type: token_type.into(),
            access_token: Zeroizing::new(access_token.into()),
        }
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// `Authorization` header value: `"<token_type> <access_token>"`.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.as_str())
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Audit metadata read from a token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Principal identifier.
    #[serde(default)]
    pub user_id: String,

    /// Human-readable username.
    #[serde(default)]
    pub user_name: String,
}

impl TokenClaims {
    /// Read the payload segment of a JWT without verifying it.
    ///
    /// Returns `None` when the token is not a three-segment JWT or its
    /// payload is not JSON. Callers treat `None` as empty audit fields, not
    /// as a failed exchange; older proxies rejected such tokens outright.
    pub fn decode_unverified(access_token: &str) -> Option<Self> {
        let mut segments = access_token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };

        let bytes = JWT_SEGMENT.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn principal(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.user_name
    }
}

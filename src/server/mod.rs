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

//! SSH proxy authentication server components.
//!
//! # Overview
//!
//! - [`auth`]: Authentication strategies and the composite dispatcher
//! - [`scheduler`]: Desired/actual workload lookups
//! - [`config`]: YAML configuration with environment overrides
//! - [`ProxyAuthHandler`]: russh authentication callbacks for one connection
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ssh_proxy_auth::server::auth::CompositeAuthenticator;
//! use ssh_proxy_auth::server::config::load_config;
//! use ssh_proxy_auth::server::ProxyAuthHandler;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = load_config(None)?;
//! let authenticator = Arc::new(CompositeAuthenticator::from_config(&config)?);
//!
//! // One handler per accepted connection
//! let handler = ProxyAuthHandler::new("10.0.0.1:52000".parse()?, Arc::clone(&authenticator));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod handler;
pub mod scheduler;

pub use self::auth::CompositeAuthenticator;
pub use self::config::{load_config, ProxyAuthConfig};
pub use self::handler::ProxyAuthHandler;

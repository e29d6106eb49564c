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

//! HTTP client for the scheduler API.
//!
//! Both lookups are JSON `POST` requests against the scheduler base URL:
//!
//! | Lookup  | Path                                                 | Body                        |
//! |---------|------------------------------------------------------|-----------------------------|
//! | actual  | `/v1/actual_lrp_groups/get_by_process_guid_and_index` | `{"process_guid", "index"}` |
//! | desired | `/v1/desired_lrps/get_by_process_guid.r2`            | `{"process_guid"}`          |
//!
//! Responses carry an optional `error` object (`{"type", "message"}`). An
//! actual lookup answers with an instance group holding the running copy and,
//! while a cell drains, an evacuating copy.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ActualInstance, DesiredWorkload, InstanceState, Scheduler};
use crate::shared::error::SchedulerError;

const ACTUAL_INSTANCE_PATH: &str = "v1/actual_lrp_groups/get_by_process_guid_and_index";
const DESIRED_WORKLOAD_PATH: &str = "v1/desired_lrps/get_by_process_guid.r2";

const RESOURCE_NOT_FOUND: &str = "ResourceNotFound";

/// Scheduler client speaking JSON over HTTP.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ssh_proxy_auth::server::scheduler::{HttpScheduler, Scheduler};
///
/// # async fn example() -> anyhow::Result<()> {
/// let scheduler = HttpScheduler::new("http://scheduler.internal:8889", Duration::from_secs(10))?;
/// let instance = scheduler.actual_instance("app-guid-x", 0).await?;
/// println!("{}", instance.address);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpScheduler {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpScheduler {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SchedulerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, parse_base_url(base_url)?))
    }

    /// Create a client from a preconfigured `reqwest::Client`.
    ///
    /// The client must have a request timeout set.
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// The scheduler base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, SchedulerError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;

        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SchedulerError::UnexpectedStatus { status });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Parse a base URL, making sure relative joins keep its path.
pub(crate) fn parse_base_url(address: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(address)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl Scheduler for HttpScheduler {
    async fn actual_instance(
        &self,
        process_guid: &str,
        index: u32,
    ) -> Result<ActualInstance, SchedulerError> {
        let request = ActualInstanceRequest {
            process_guid,
            index,
        };
        let response: ActualInstanceResponse = self.post(ACTUAL_INSTANCE_PATH, &request).await?;

        if let Some(error) = response.error {
            return Err(error.into_scheduler_error(|| {
                format!("actual instance {process_guid}/{index}")
            }));
        }

        response
            .actual_lrp_group
            .and_then(ActualInstanceGroup::resolve)
            .ok_or_else(|| SchedulerError::NotFound {
                resource: format!("actual instance {process_guid}/{index}"),
            })
    }

    async fn desired_workload(
        &self,
        process_guid: &str,
    ) -> Result<DesiredWorkload, SchedulerError> {
        let request = DesiredWorkloadRequest { process_guid };
        let response: DesiredWorkloadResponse = self.post(DESIRED_WORKLOAD_PATH, &request).await?;

        if let Some(error) = response.error {
            return Err(error.into_scheduler_error(|| format!("desired workload {process_guid}")));
        }

        response
            .desired_lrp
            .ok_or_else(|| SchedulerError::NotFound {
                resource: format!("desired workload {process_guid}"),
            })
    }
}

#[derive(Debug, Serialize)]
struct ActualInstanceRequest<'a> {
    process_guid: &'a str,
    index: u32,
}

#[derive(Debug, Serialize)]
struct DesiredWorkloadRequest<'a> {
    process_guid: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl ErrorBody {
    fn into_scheduler_error(self, resource: impl FnOnce() -> String) -> SchedulerError {
        if self.kind == RESOURCE_NOT_FOUND {
            SchedulerError::NotFound {
                resource: resource(),
            }
        } else {
            SchedulerError::Api {
                kind: self.kind,
                message: self.message,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActualInstanceResponse {
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    actual_lrp_group: Option<ActualInstanceGroup>,
}

#[derive(Debug, Deserialize)]
struct DesiredWorkloadResponse {
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    desired_lrp: Option<DesiredWorkload>,
}

/// Running and evacuating copies of one instance.
#[derive(Debug, Default, Deserialize)]
struct ActualInstanceGroup {
    #[serde(default)]
    instance: Option<ActualInstance>,
    #[serde(default)]
    evacuating: Option<ActualInstance>,
}

impl ActualInstanceGroup {
    /// Pick the copy that should receive traffic.
    ///
    /// The running copy wins once it is `RUNNING` or `CRASHED`; before that
    /// the evacuating copy is still the live one.
    fn resolve(self) -> Option<ActualInstance> {
        match (self.instance, self.evacuating) {
            (None, None) => None,
            (Some(instance), None) => Some(instance),
            (None, Some(evacuating)) => Some(evacuating),
            (Some(instance), Some(evacuating)) => {
                if matches!(
                    instance.state,
                    InstanceState::Running | InstanceState::Crashed
                ) {
                    Some(instance)
                } else {
                    Some(evacuating)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(state: InstanceState, address: &str) -> ActualInstance {
        ActualInstance {
            process_guid: "app-guid-x".to_string(),
            index: 0,
            state,
            address: address.to_string(),
            ports: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_prefers_running_instance() {
        let group = ActualInstanceGroup {
            instance: Some(instance(InstanceState::Running, "10.0.0.1")),
            evacuating: Some(instance(InstanceState::Running, "10.0.0.2")),
        };
        assert_eq!(group.resolve().unwrap().address, "10.0.0.1");
    }

    #[test]
    fn test_resolve_uses_evacuating_while_claimed() {
        let group = ActualInstanceGroup {
            instance: Some(instance(InstanceState::Claimed, "10.0.0.1")),
            evacuating: Some(instance(InstanceState::Running, "10.0.0.2")),
        };
        assert_eq!(group.resolve().unwrap().address, "10.0.0.2");
    }

    #[test]
    fn test_resolve_single_copies() {
        let only_evacuating = ActualInstanceGroup {
            instance: None,
            evacuating: Some(instance(InstanceState::Running, "10.0.0.2")),
        };
        assert_eq!(only_evacuating.resolve().unwrap().address, "10.0.0.2");

        assert!(ActualInstanceGroup::default().resolve().is_none());
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let url = parse_base_url("http://scheduler.internal:8889/api").unwrap();
        assert_eq!(
            url.join(DESIRED_WORKLOAD_PATH).unwrap().as_str(),
            "http://scheduler.internal:8889/api/v1/desired_lrps/get_by_process_guid.r2"
        );
    }

    #[test]
    fn test_error_body_mapping() {
        let not_found = ErrorBody {
            kind: RESOURCE_NOT_FOUND.to_string(),
            message: "the requested resource could not be found".to_string(),
        };
        assert!(matches!(
            not_found.into_scheduler_error(|| "desired workload x".to_string()),
            SchedulerError::NotFound { .. }
        ));

        let other = ErrorBody {
            kind: "Deadlock".to_string(),
            message: "try again".to_string(),
        };
        assert!(matches!(
            other.into_scheduler_error(|| "desired workload x".to_string()),
            SchedulerError::Api { .. }
        ));
    }
}

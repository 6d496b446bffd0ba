use async_trait::async_trait;
use url::Url;

use crate::config::DownstreamConfig;
use crate::services::composer::TargetStatePayload;
use crate::services::downstream::{execute, join_segments, DownstreamError, DownstreamResponse};
use crate::types::StateTransitionRequest;

/// Downstream services that apply state changes
#[async_trait]
pub trait ControlService: Send + Sync {
    /// Submit a whole batch of relay state changes as one call
    async fn post_states(
        &self,
        batch: &[TargetStatePayload],
    ) -> Result<DownstreamResponse, DownstreamError>;

    /// Change the state of an automation mode
    async fn post_mode_state(
        &self,
        mode_key: &str,
        request: &StateTransitionRequest,
    ) -> Result<DownstreamResponse, DownstreamError>;
}

/// `ControlService` over HTTP: relays go to the device API, modes to the automation API
#[derive(Clone)]
pub struct HttpControlService {
    client: reqwest::Client,
    vanpi_api_root_url: Url,
    automation_api_root_url: Url,
}

impl HttpControlService {
    pub fn new(client: reqwest::Client, config: &DownstreamConfig) -> Self {
        Self {
            client,
            vanpi_api_root_url: config.vanpi_api_root_url.clone(),
            automation_api_root_url: config.automation_api_root_url.clone(),
        }
    }
}

#[async_trait]
impl ControlService for HttpControlService {
    async fn post_states(
        &self,
        batch: &[TargetStatePayload],
    ) -> Result<DownstreamResponse, DownstreamError> {
        let url = join_segments(&self.vanpi_api_root_url, &["relays", "state"])?;
        execute(self.client.post(url.clone()).json(batch), &url).await
    }

    async fn post_mode_state(
        &self,
        mode_key: &str,
        request: &StateTransitionRequest,
    ) -> Result<DownstreamResponse, DownstreamError> {
        let url = join_segments(&self.automation_api_root_url, &["modes", mode_key])?;
        execute(self.client.post(url.clone()).json(request), &url).await
    }
}

// ABOUTME: reqwest implementation of AgentGateway against the AI-control backend.
// ABOUTME: JSON over HTTP; non-2xx responses become BackendError with the backend's detail.

use crate::error::BackendError;
use crate::traits::AgentGateway;
use crate::types::{
    parse_ack, Ack, Character, CharacterList, Endpoint, StartAgentRequest,
    StartConversationRequest, StopAgentRequest,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Normalize a configured base URL so paths can be appended directly
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Turn a response into its body text, or a BackendError for non-2xx statuses
pub(crate) async fn read_body(path: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read response body from {}", path))?;
    if !status.is_success() {
        return Err(BackendError::from_body(path, status.as_u16(), &body).into());
    }
    Ok(body)
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// HTTP client for the AI-control backend
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "Backend URL must start with http:// or https://, got: {}",
            base_url
        );
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        join_url(&self.base_url, endpoint.path())
    }

    async fn post<T: Serialize + Sync>(&self, endpoint: Endpoint, body: &T) -> Result<Ack> {
        tracing::debug!(endpoint = %endpoint, "POST to AI backend");
        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;
        let body = read_body(endpoint.path(), response).await?;
        Ok(parse_ack(&body))
    }
}

#[async_trait]
impl AgentGateway for HttpGateway {
    async fn list_characters(&self) -> Result<Vec<Character>> {
        let endpoint = Endpoint::ListCharacters;
        let response = self
            .client
            .get(self.url(endpoint))
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;
        let body = read_body(endpoint.path(), response).await?;
        let list: CharacterList = serde_json::from_str(&body)
            .with_context(|| format!("Invalid character list from {}", endpoint))?;
        tracing::debug!(count = list.characters.len(), "Fetched character catalog");
        Ok(list.characters)
    }

    async fn start_agent(&self, channel_id: &str, character_id: Option<&str>) -> Result<Ack> {
        let body = StartAgentRequest {
            channel_id: channel_id.to_string(),
            character_id: character_id.map(str::to_string),
        };
        self.post(Endpoint::StartAgent, &body).await
    }

    async fn start_conversation(
        &self,
        channel_id: &str,
        character_ids: &[String],
        max_turns: Option<u32>,
    ) -> Result<Ack> {
        let body = StartConversationRequest {
            channel_id: channel_id.to_string(),
            character_ids: character_ids.to_vec(),
            max_turns,
        };
        self.post(Endpoint::StartConversation, &body).await
    }

    async fn stop_agent(&self, channel_id: &str) -> Result<Ack> {
        let body = StopAgentRequest {
            channel_id: channel_id.to_string(),
        };
        self.post(Endpoint::StopAgent, &body).await
    }
}

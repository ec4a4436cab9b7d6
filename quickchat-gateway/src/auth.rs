// ABOUTME: reqwest client for the auth backend's login and register endpoints.
// ABOUTME: Returns the platform token and user id; backend `detail` messages surface as errors.

use crate::http::{build_client, join_url, read_body};
use crate::traits::AuthBackend;
use crate::types::{AuthRequest, AuthResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";

#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    async fn send(&self, path: &str, body: AuthRequest<'_>) -> Result<AuthResponse> {
        anyhow::ensure!(!body.id.trim().is_empty(), "Username is required");
        tracing::debug!(path = %path, user_id = %body.id, "Sending auth request");
        let response = self
            .client
            .post(join_url(&self.base_url, path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", path))?;
        let text = read_body(path, response).await?;
        serde_json::from_str(&text).with_context(|| format!("Invalid auth response from {}", path))
    }
}

#[async_trait]
impl AuthBackend for HttpAuthClient {
    async fn login(&self, user_id: &str) -> Result<AuthResponse> {
        self.send(
            LOGIN_PATH,
            AuthRequest {
                id: user_id,
                name: None,
            },
        )
        .await
    }

    async fn register(&self, user_id: &str, display_name: Option<&str>) -> Result<AuthResponse> {
        let name = display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(user_id);
        self.send(
            REGISTER_PATH,
            AuthRequest {
                id: user_id,
                name: Some(name),
            },
        )
        .await
    }
}

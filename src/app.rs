// ABOUTME: Application wiring for the CLI: credential store, auth backend, and agent controls.
// ABOUTME: Each command is one method so the binary stays a thin argument dispatcher.
use anyhow::{Context, Result};
use quickchat_core::config::Config;
use quickchat_core::{AgentControls, CredentialStore, Credentials, SqliteCredentialStore};
use quickchat_gateway::{Ack, AgentGateway, AuthBackend, Character, HttpAuthClient, HttpGateway};
use std::sync::Arc;

pub struct App {
    store: Arc<dyn CredentialStore>,
    auth: Arc<dyn AuthBackend>,
    gateway: Arc<dyn AgentGateway>,
    controls: AgentControls,
    max_turns: Option<u32>,
}

impl App {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        auth: Arc<dyn AuthBackend>,
        gateway: Arc<dyn AgentGateway>,
        max_turns: Option<u32>,
    ) -> Self {
        let controls = AgentControls::new(Arc::clone(&gateway)).with_max_turns(max_turns);
        Self {
            store,
            auth,
            gateway,
            controls,
            max_turns,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.database_path();
        let store = SqliteCredentialStore::new(&db_path)
            .with_context(|| format!("Failed to open credential store at {}", db_path.display()))?;
        let auth = HttpAuthClient::new(config.auth_url(), config.timeout())?;
        let gateway = HttpGateway::new(&config.backend.url, config.timeout())?;

        tracing::debug!(
            backend = %config.backend.url,
            auth = %config.auth_url(),
            db_path = %db_path.display(),
            "Application wired"
        );

        Ok(Self::new(
            Arc::new(store),
            Arc::new(auth),
            Arc::new(gateway),
            config.conversation.max_turns,
        ))
    }

    /// Log in an existing user and persist the issued credentials
    pub async fn login(&self, user_id: &str) -> Result<Credentials> {
        let response = self.auth.login(user_id).await?;
        let credentials = Credentials::from(response);
        self.store.save(&credentials)?;
        tracing::info!(user_id = %credentials.user_id, "Logged in");
        Ok(credentials)
    }

    /// Register a new user and persist the issued credentials
    pub async fn register(&self, user_id: &str, name: Option<&str>) -> Result<Credentials> {
        let response = self.auth.register(user_id, name).await?;
        let credentials = Credentials::from(response);
        self.store.save(&credentials)?;
        tracing::info!(user_id = %credentials.user_id, "Registered");
        Ok(credentials)
    }

    /// Forget stored credentials. Returns whether anyone was logged in.
    pub fn logout(&self) -> Result<bool> {
        let had_user = self.store.load().is_some();
        self.store.clear()?;
        Ok(had_user)
    }

    pub fn whoami(&self) -> Option<String> {
        self.store.load().map(|c| c.user_id)
    }

    pub async fn characters(&self) -> Result<Vec<Character>> {
        Ok(self.controls.list_characters().await?)
    }

    pub async fn start_agent(&self, channel_id: &str, character_id: Option<&str>) -> Result<Ack> {
        Ok(self
            .controls
            .start_single_agent(channel_id, character_id)
            .await?)
    }

    pub async fn stop_agent(&self, channel_id: &str) -> Result<Ack> {
        Ok(self.controls.stop_agent(channel_id).await?)
    }

    /// Start a conversation between `first` and `second`, in that order
    pub async fn converse(
        &self,
        channel_id: &str,
        first: &str,
        second: &str,
        max_turns: Option<u32>,
    ) -> Result<Ack> {
        let controls =
            AgentControls::new(Arc::clone(&self.gateway)).with_max_turns(max_turns.or(self.max_turns));
        controls.toggle_selection(first);
        controls.toggle_selection(second);
        Ok(controls.start_conversation(channel_id).await?)
    }
}

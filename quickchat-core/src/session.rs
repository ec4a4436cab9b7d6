// ABOUTME: Session lifecycle state machine between stored credentials and the platform SDK.
// ABOUTME: Connects from stored credentials, clears them on failure, and always releases the connection.
use crate::credentials::{CredentialStore, Credentials};
use crate::metrics;
use crate::traits::{ChatClient, ChatUser};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub credentials: Option<Credentials>,
}

impl Session {
    fn disconnected() -> Self {
        Self {
            state: SessionState::Disconnected,
            credentials: None,
        }
    }
}

async fn disconnect_logged(client: Arc<dyn ChatClient>) {
    match client.disconnect().await {
        Ok(()) => tracing::info!("User disconnected"),
        Err(e) => tracing::warn!(error = %e, "Error during disconnect"),
    }
}

/// Owns the one Session of a running client.
///
/// Only this type transitions the session. A successful connect is paired with
/// exactly one disconnect, issued by `logout`, `shutdown`, a later
/// `authenticated`, or drop, whichever comes first. Connect attempts run one at
/// a time, so a late result can only be orphaned by `logout` or `shutdown`.
pub struct SessionManager {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn CredentialStore>,
    tx: watch::Sender<Session>,
    /// True while a connect has succeeded and not yet been released
    live: AtomicBool,
    /// Bumped by every connect attempt and every logout/shutdown
    epoch: AtomicU64,
    /// Held across a whole connect attempt
    connecting: Mutex<()>,
}

impl SessionManager {
    pub fn new(client: Arc<dyn ChatClient>, store: Arc<dyn CredentialStore>) -> Self {
        let (tx, _rx) = watch::channel(Session::disconnected());
        Self {
            client,
            store,
            tx,
            live: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            connecting: Mutex::new(()),
        }
    }

    pub fn session(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().state
    }

    /// Channel views may mount only while this is true
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Wait until the session rests in Connected or Disconnected
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut rx = self.tx.subscribe();
        let settled = rx
            .wait_for(|s| {
                matches!(
                    s.state,
                    SessionState::Connected | SessionState::Disconnected
                )
            })
            .await;
        match settled {
            Ok(session) => session.state,
            // The sender lives in self, so the channel cannot close while we borrow it
            Err(_) => self.state(),
        }
    }

    /// Wait for the current connect attempt to settle; true if it connected
    pub async fn wait_until_connected(&self) -> bool {
        self.wait_until_settled().await == SessionState::Connected
    }

    fn transition(&self, state: SessionState, credentials: Option<Credentials>) {
        let previous = self.tx.send_replace(Session { state, credentials }).state;
        tracing::info!(from = %previous, to = %state, "Session transition");
        metrics::record_session_transition(state.as_str());
    }

    /// Connect from stored credentials, if any. Called at startup.
    pub async fn start(&self) -> SessionState {
        let _connecting = self.connecting.lock().await;
        match self.store.load() {
            Some(credentials) => self.connect(credentials).await,
            None => {
                tracing::info!("No stored credentials, authentication required");
                self.state()
            }
        }
    }

    /// Persist fresh credentials from the auth backend and connect with them
    pub async fn authenticated(&self, credentials: Credentials) -> Result<SessionState> {
        let _connecting = self.connecting.lock().await;
        self.store.save(&credentials)?;
        if self.live.swap(false, Ordering::SeqCst) {
            tracing::info!("Replacing existing connection");
            disconnect_logged(self.client.clone()).await;
        }
        Ok(self.connect(credentials).await)
    }

    async fn connect(&self, credentials: Credentials) -> SessionState {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.transition(SessionState::Connecting, Some(credentials.clone()));

        let user = ChatUser::with_name(&credentials.user_id, &credentials.user_id);
        tracing::info!(user_id = %user.id, "Attempting to connect user");
        let result = self.client.connect(&user, &credentials.token).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            // Logged out or shut down while connecting; the result belongs to nobody
            tracing::info!(user_id = %user.id, "Connect attempt superseded");
            if result.is_ok() {
                disconnect_logged(self.client.clone()).await;
            }
            return self.state();
        }

        match result {
            Ok(()) => {
                self.live.store(true, Ordering::SeqCst);
                tracing::info!(user_id = %user.id, "Successfully connected user");
                self.transition(SessionState::Connected, Some(credentials));
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user.id,
                    error = %e,
                    "Error connecting user, clearing stored credentials"
                );
                self.transition(SessionState::Failed, Some(credentials));
                if let Err(e) = self.store.clear() {
                    tracing::error!(error = %e, "Failed to clear credentials after connect failure");
                }
                self.transition(SessionState::Disconnected, None);
            }
        }
        self.state()
    }

    /// Clear credentials and return to Disconnected immediately. The SDK
    /// disconnect runs in the background; its handle is returned when one was
    /// issued so callers can await it.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        tracing::info!("Logging out");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %e, "Failed to clear credentials on logout");
        }
        self.transition(SessionState::Disconnected, None);
        self.spawn_disconnect()
    }

    /// Release the connection without touching stored credentials
    pub async fn shutdown(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if self.live.swap(false, Ordering::SeqCst) {
            disconnect_logged(self.client.clone()).await;
        }
        if self.state() != SessionState::Disconnected {
            self.transition(SessionState::Disconnected, None);
        }
    }

    fn spawn_disconnect(&self) -> Option<JoinHandle<()>> {
        if !self.live.swap(false, Ordering::SeqCst) {
            return None;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(disconnect_logged(self.client.clone()))),
            Err(_) => {
                tracing::error!("No async runtime available, transport session not disconnected");
                None
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.live.load(Ordering::SeqCst) {
            tracing::debug!("Session manager dropped while connected, disconnecting");
            let _ = self.spawn_disconnect();
        }
    }
}

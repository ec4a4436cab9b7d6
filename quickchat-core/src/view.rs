// ABOUTME: A mounted channel view: presence tracking, agent controls, and the error sink together.
// ABOUTME: Mounting requires a connected session; dropping the view tears down its tracker.
use crate::controls::{agent_button_label, AgentAction, AgentControls};
use crate::error::{report, ControlError, ErrorSink, ErrorSource, ViewError};
use crate::header::ChannelHeader;
use crate::presence::{AgentMatcher, PresenceSet, PresenceTracker};
use crate::session::SessionManager;
use crate::traits::ChatChannel;
use anyhow::Result;
use quickchat_gateway::{Ack, Character};
use std::sync::Arc;

pub struct ChannelView {
    channel: Arc<dyn ChatChannel>,
    controls: Arc<AgentControls>,
    presence: PresenceTracker,
    errors: ErrorSink,
}

impl ChannelView {
    pub fn mount(
        session: &SessionManager,
        channel: Arc<dyn ChatChannel>,
        controls: Arc<AgentControls>,
        matcher: AgentMatcher,
        errors: ErrorSink,
    ) -> Result<Self> {
        if !session.is_ready() {
            anyhow::bail!(
                "Cannot open channel {} while session is {}",
                channel.id(),
                session.state()
            );
        }
        let presence = PresenceTracker::mount(Arc::clone(&channel), matcher, errors.clone())?;
        tracing::info!(channel_id = %channel.id(), "Channel view mounted");
        Ok(Self {
            channel,
            controls,
            presence,
            errors,
        })
    }

    pub fn channel_id(&self) -> &str {
        self.channel.id()
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn controls(&self) -> &AgentControls {
        &self.controls
    }

    pub fn is_agent_present(&self) -> bool {
        self.presence.is_agent_present()
    }

    pub fn agent_button_label(&self) -> &'static str {
        agent_button_label(
            self.is_agent_present(),
            self.controls.is_agent_toggle_pending(self.channel_id()),
        )
    }

    pub fn is_conversation_pending(&self) -> bool {
        self.controls
            .is_pending(self.channel_id(), AgentAction::StartConversation)
    }

    /// Load the character catalog for this view. Failures go to the error
    /// sink and leave the catalog empty.
    pub async fn load_catalog(&self) -> Vec<Character> {
        match self.controls.list_characters().await {
            Ok(characters) => characters,
            Err(e) => {
                self.report(ErrorSource::Catalog, None, &e);
                Vec::new()
            }
        }
    }

    /// Add or remove the AI depending on current presence
    pub async fn toggle_agent(&self) -> Result<Ack, ControlError> {
        let result = self
            .controls
            .toggle_agent(self.channel_id(), self.is_agent_present())
            .await;
        self.report_failure(&result);
        result
    }

    pub async fn start_conversation(&self) -> Result<Ack, ControlError> {
        let result = self.controls.start_conversation(self.channel_id()).await;
        self.report_failure(&result);
        result
    }

    pub async fn header(&self) -> ChannelHeader {
        let member_count = match self.channel.member_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(channel_id = %self.channel_id(), error = %e, "Failed to read member count");
                0
            }
        };
        ChannelHeader::new(self.channel.name(), member_count, self.is_agent_present())
    }

    pub async fn wait_for_presence(&self, present: bool) -> PresenceSet {
        self.presence
            .wait_for(|set| set.is_agent_present() == present)
            .await
    }

    fn report_failure(&self, result: &Result<Ack, ControlError>) {
        if let Err(e @ ControlError::Gateway { .. }) = result {
            self.report(ErrorSource::Agent, Some(self.channel_id().to_string()), e);
        }
    }

    fn report(&self, source: ErrorSource, channel_id: Option<String>, e: &ControlError) {
        report(
            &self.errors,
            ViewError {
                source,
                channel_id,
                message: e.to_string(),
            },
        );
    }
}

impl Drop for ChannelView {
    fn drop(&mut self) {
        tracing::info!(channel_id = %self.channel.id(), "Channel view unmounted");
    }
}

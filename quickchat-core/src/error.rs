// ABOUTME: Error types for agent controls and the per-view error channel.
// ABOUTME: ControlError is returned to callers; ViewError flows to the owning view's sink.

use crate::controls::AgentAction;
use thiserror::Error;
use tokio::sync::mpsc;

/// Outcome of a rejected or failed agent control operation
#[derive(Debug, Error)]
pub enum ControlError {
    /// Conversation start needs exactly two characters; no request was sent
    #[error("Select exactly 2 characters to start a conversation (selected {selected})")]
    InvalidSelection { selected: usize },

    /// The same action is already in flight for this channel
    #[error("{action} already in progress for channel {channel_id}")]
    Busy {
        channel_id: String,
        action: AgentAction,
    },

    /// The backend call failed
    #[error("{action} failed for channel {channel_id}: {error:#}")]
    Gateway {
        channel_id: String,
        action: AgentAction,
        error: anyhow::Error,
    },

    /// The character catalog could not be fetched
    #[error("Failed to load characters: {0:#}")]
    Catalog(anyhow::Error),
}

impl ControlError {
    /// True for rejections that happened before any network call
    pub fn is_rejected_locally(&self) -> bool {
        matches!(self, Self::InvalidSelection { .. } | Self::Busy { .. })
    }
}

/// Which part of a view reported an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Presence,
    Catalog,
    Agent,
}

/// Error delivered to the owning view. Nothing here is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub source: ErrorSource,
    pub channel_id: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.channel_id {
            Some(channel_id) => write!(f, "[{:?} {}] {}", self.source, channel_id, self.message),
            None => write!(f, "[{:?}] {}", self.source, self.message),
        }
    }
}

pub type ErrorSink = mpsc::UnboundedSender<ViewError>;

pub fn error_channel() -> (ErrorSink, mpsc::UnboundedReceiver<ViewError>) {
    mpsc::unbounded_channel()
}

/// Send to a sink whose receiver may already be gone
pub(crate) fn report(sink: &ErrorSink, error: ViewError) {
    if sink.send(error).is_err() {
        tracing::debug!("Error sink closed, dropping view error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_selection_message() {
        let err = ControlError::InvalidSelection { selected: 1 };
        assert_eq!(
            err.to_string(),
            "Select exactly 2 characters to start a conversation (selected 1)"
        );
        assert!(err.is_rejected_locally());
    }

    #[test]
    fn test_gateway_error_includes_cause() {
        let err = ControlError::Gateway {
            channel_id: "ai".to_string(),
            action: AgentAction::StopAgent,
            error: anyhow::anyhow!("connection refused"),
        };
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_rejected_locally());
    }

    #[test]
    fn test_view_error_display() {
        let err = ViewError {
            source: ErrorSource::Presence,
            channel_id: Some("ai".to_string()),
            message: "query failed".to_string(),
        };
        assert_eq!(err.to_string(), "[Presence ai] query failed");
    }

    #[test]
    fn test_report_to_closed_sink_is_silent() {
        let (tx, rx) = error_channel();
        drop(rx);
        report(
            &tx,
            ViewError {
                source: ErrorSource::Catalog,
                channel_id: None,
                message: "x".to_string(),
            },
        );
    }
}

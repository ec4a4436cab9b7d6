// ABOUTME: Counters for session transitions, presence reconciliations, and agent requests.
// ABOUTME: Thin wrappers over the `metrics` facade; no exporter is installed by the core.

pub const SESSION_TRANSITIONS: &str = "quickchat_session_transitions_total";
pub const PRESENCE_RECONCILIATIONS: &str = "quickchat_presence_reconciliations_total";
pub const AGENT_REQUESTS: &str = "quickchat_agent_requests_total";

pub fn record_session_transition(state: &'static str) {
    metrics::counter!(SESSION_TRANSITIONS, "state" => state).increment(1);
}

/// `outcome` is one of "ok", "error", "discarded"
pub fn record_reconciliation(outcome: &'static str) {
    metrics::counter!(PRESENCE_RECONCILIATIONS, "outcome" => outcome).increment(1);
}

pub fn record_agent_request(action: &'static str, outcome: &'static str) {
    metrics::counter!(AGENT_REQUESTS, "action" => action, "outcome" => outcome).increment(1);
}

// ABOUTME: Tests for agent controls: selection, conversation validation, and the Pending gate
// ABOUTME: Uses the recording MockGateway to observe exactly which requests reach the backend

use quickchat_core::{AgentAction, AgentControls, AgentSelection, Character, ControlError};
use quickchat_gateway::testing::{GatewayCall, MockGateway};
use quickchat_gateway::Endpoint;
use std::sync::Arc;
use std::time::Duration;

fn catalog() -> Vec<Character> {
    vec![
        Character::new("a", "Socrates", "Asks questions"),
        Character::new("b", "Tesla", "Invents things"),
        Character::new("c", "Curie", "Measures things"),
    ]
}

async fn eventually(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_conversation_with_two_selected() {
    let mock = MockGateway::new().with_characters(catalog());
    let controls = AgentControls::new(Arc::new(mock.clone()));

    let characters = controls.list_characters().await.unwrap();
    assert_eq!(characters.len(), 3);

    controls.toggle_selection("a");
    controls.toggle_selection("b");
    let selection = controls.toggle_selection("c");
    assert_eq!(selection.ids(), &["a".to_string(), "b".to_string()]);
    assert!(!controls.can_select("c"));
    assert!(controls.can_select("a"));

    controls.start_conversation("ai").await.unwrap();

    assert_eq!(mock.calls_to(Endpoint::StartConversation), 1);
    assert_eq!(
        mock.calls().last(),
        Some(&GatewayCall::StartConversation {
            channel_id: "ai".to_string(),
            character_ids: vec!["a".to_string(), "b".to_string()],
            max_turns: None,
        })
    );
}

#[tokio::test]
async fn test_conversation_order_follows_selection() {
    let mock = MockGateway::new();
    let controls = AgentControls::new(Arc::new(mock.clone())).with_max_turns(Some(4));

    controls.toggle_selection("b");
    controls.toggle_selection("a");
    controls.start_conversation("general").await.unwrap();

    assert_eq!(
        mock.calls(),
        vec![GatewayCall::StartConversation {
            channel_id: "general".to_string(),
            character_ids: vec!["b".to_string(), "a".to_string()],
            max_turns: Some(4),
        }]
    );
}

#[tokio::test]
async fn test_conversation_rejected_without_two_selected() {
    let mock = MockGateway::new();
    let controls = AgentControls::new(Arc::new(mock.clone()));

    let err = controls.start_conversation("ai").await.unwrap_err();
    assert!(matches!(err, ControlError::InvalidSelection { selected: 0 }));

    controls.toggle_selection("a");
    let err = controls.start_conversation("ai").await.unwrap_err();
    assert!(matches!(err, ControlError::InvalidSelection { selected: 1 }));
    assert!(err.is_rejected_locally());

    assert!(mock.calls().is_empty());
    assert!(!controls.is_pending("ai", AgentAction::StartConversation));
}

#[tokio::test]
async fn test_pending_clears_after_failure() {
    let mock = MockGateway::new()
        .fail_on(Endpoint::StartAgent, "no characters configured")
        .fail_on(Endpoint::StopAgent, "agent not running");
    let controls = AgentControls::new(Arc::new(mock.clone()));

    let err = controls.start_single_agent("ai", None).await.unwrap_err();
    match err {
        ControlError::Gateway { action, error, .. } => {
            assert_eq!(action, AgentAction::StartAgent);
            assert!(format!("{:#}", error).contains("no characters configured"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!controls.is_pending("ai", AgentAction::StartAgent));

    assert!(controls.stop_agent("ai").await.is_err());
    assert!(!controls.is_pending("ai", AgentAction::StopAgent));

    // The gate is usable again right away
    mock.recover(Endpoint::StartAgent);
    controls.start_single_agent("ai", Some("a")).await.unwrap();
    assert_eq!(mock.calls_to(Endpoint::StartAgent), 2);
}

#[tokio::test]
async fn test_pending_clears_after_success() {
    let mock = MockGateway::new();
    let controls = AgentControls::new(Arc::new(mock.clone()));

    controls.start_single_agent("ai", Some("a")).await.unwrap();
    controls.stop_agent("ai").await.unwrap();

    assert!(!controls.is_agent_toggle_pending("ai"));
    assert_eq!(
        mock.calls(),
        vec![
            GatewayCall::StartAgent {
                channel_id: "ai".to_string(),
                character_id: Some("a".to_string()),
            },
            GatewayCall::StopAgent {
                channel_id: "ai".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_second_trigger_while_pending_is_busy() {
    let mock = MockGateway::new().held();
    let controls = Arc::new(AgentControls::new(Arc::new(mock.clone())));

    let first = {
        let controls = controls.clone();
        tokio::spawn(async move { controls.start_single_agent("ai", None).await })
    };
    eventually(|| mock.calls().len() == 1).await;
    assert!(controls.is_pending("ai", AgentAction::StartAgent));

    let err = controls.start_single_agent("ai", None).await.unwrap_err();
    assert!(matches!(
        err,
        ControlError::Busy {
            action: AgentAction::StartAgent,
            ..
        }
    ));
    // The toggle button is busy too
    assert!(matches!(
        controls.toggle_agent("ai", false).await,
        Err(ControlError::Busy { .. })
    ));
    assert_eq!(mock.calls().len(), 1);

    mock.release(1);
    first.await.unwrap().unwrap();
    assert!(!controls.is_pending("ai", AgentAction::StartAgent));
}

#[tokio::test]
async fn test_pending_is_per_channel() {
    let mock = MockGateway::new().held();
    let controls = Arc::new(AgentControls::new(Arc::new(mock.clone())));

    let in_ai = {
        let controls = controls.clone();
        tokio::spawn(async move { controls.stop_agent("ai").await })
    };
    let in_general = {
        let controls = controls.clone();
        tokio::spawn(async move { controls.stop_agent("general").await })
    };
    eventually(|| mock.calls().len() == 2).await;
    assert!(controls.is_pending("ai", AgentAction::StopAgent));
    assert!(controls.is_pending("general", AgentAction::StopAgent));

    mock.release(2);
    in_ai.await.unwrap().unwrap();
    in_general.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_toggle_agent_follows_presence() {
    let mock = MockGateway::new();
    let controls = AgentControls::new(Arc::new(mock.clone()));

    controls.toggle_agent("ai", false).await.unwrap();
    controls.toggle_agent("ai", true).await.unwrap();

    assert_eq!(mock.calls_to(Endpoint::StartAgent), 1);
    assert_eq!(mock.calls_to(Endpoint::StopAgent), 1);
}

#[tokio::test]
async fn test_catalog_failure_empties_cache() {
    let mock = MockGateway::new().with_characters(catalog());
    let controls = AgentControls::new(Arc::new(mock.clone()));
    controls.list_characters().await.unwrap();
    assert_eq!(controls.characters().len(), 3);

    // Clones share state, so this makes the same backend start failing
    let _ = mock.clone().fail_on(Endpoint::ListCharacters, "backend down");
    let err = controls.list_characters().await.unwrap_err();
    assert!(matches!(err, ControlError::Catalog(_)));
    assert!(err.to_string().contains("backend down"));
    assert!(controls.characters().is_empty());
}

#[tokio::test]
async fn test_clear_selection() {
    let controls = AgentControls::new(Arc::new(MockGateway::new()));
    controls.toggle_selection("a");
    controls.toggle_selection("b");
    controls.clear_selection();
    assert!(controls.selection().is_empty());
}

#[tokio::test]
async fn test_conversation_with_explicit_selection() {
    let mock = MockGateway::new();
    let controls = AgentControls::new(Arc::new(mock.clone()));

    let mut selection = AgentSelection::new();
    selection.toggle("c");
    let err = controls
        .start_conversation_with("ai", &selection)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidSelection { selected: 1 }));

    selection.toggle("a");
    controls.start_conversation_with("ai", &selection).await.unwrap();
    assert_eq!(
        mock.calls(),
        vec![GatewayCall::StartConversation {
            channel_id: "ai".to_string(),
            character_ids: vec!["c".to_string(), "a".to_string()],
            max_turns: None,
        }]
    );
    // The controls' own selection is untouched
    assert!(controls.selection().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_send_one_request() {
    let mock = MockGateway::new().held();
    let controls = Arc::new(AgentControls::new(Arc::new(mock.clone())));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let controls = controls.clone();
            tokio::spawn(async move { controls.toggle_agent("ai", i % 2 == 0).await })
        })
        .collect();

    // Every toggle but the one in flight is turned away
    eventually(|| handles.iter().filter(|h| h.is_finished()).count() == 15).await;
    assert_eq!(mock.calls().len(), 1);

    mock.release(1);
    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(err) => assert!(matches!(err, ControlError::Busy { .. })),
        }
    }
    assert_eq!(completed, 1);
    assert!(!controls.is_agent_toggle_pending("ai"));
}

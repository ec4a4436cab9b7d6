// ABOUTME: Tests for the session lifecycle state machine
// ABOUTME: Verifies connect from stored credentials, failure recovery, and exactly-once disconnect

use quickchat_core::testing::MockChatClient;
use quickchat_core::{
    CredentialStore, Credentials, MemoryCredentialStore, SessionManager, SessionState,
};
use std::sync::Arc;
use std::time::Duration;

fn manager_with(
    client: &MockChatClient,
    store: &Arc<MemoryCredentialStore>,
) -> SessionManager {
    SessionManager::new(Arc::new(client.clone()), store.clone())
}

/// Poll `cond` while yielding to spawned tasks
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
async fn test_start_without_credentials_stays_disconnected() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager_with(&client, &store);

    assert_eq!(manager.start().await, SessionState::Disconnected);
    assert_eq!(client.connects(), 0);
    assert!(!manager.is_ready());
}

#[tokio::test]
async fn test_start_connects_with_stored_credentials() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "tok",
    )));
    let manager = manager_with(&client, &store);

    assert_eq!(manager.start().await, SessionState::Connected);
    assert!(manager.is_ready());
    assert!(manager.wait_until_connected().await);

    let users = client.connected_users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].0.id, "u1");
    assert_eq!(users[0].0.display_name.as_deref(), Some("u1"));
    assert_eq!(users[0].1, "tok");
    assert_eq!(
        manager.session().credentials,
        Some(Credentials::new("u1", "tok"))
    );
}

#[tokio::test]
async fn test_connect_failure_clears_store_and_disconnects() {
    let client = MockChatClient::new().fail_connect("invalid token");
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "bad",
    )));
    let manager = manager_with(&client, &store);

    let state = manager.start().await;

    assert_eq!(state, SessionState::Disconnected);
    assert!(store.load().is_none());
    assert!(manager.session().credentials.is_none());
    assert_eq!(client.connects(), 1);
    // A failed connect never acquired a connection, so nothing to release
    assert_eq!(client.disconnects(), 0);
    assert!(manager.logout().is_none());
}

#[tokio::test]
async fn test_authenticated_saves_then_connects() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager_with(&client, &store);

    let state = manager
        .authenticated(Credentials::new("alice", "t1"))
        .await
        .unwrap();

    assert_eq!(state, SessionState::Connected);
    assert_eq!(store.load(), Some(Credentials::new("alice", "t1")));
}

#[tokio::test]
async fn test_logout_disconnects_exactly_once() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "tok",
    )));
    let manager = manager_with(&client, &store);
    manager.start().await;

    let handle = manager.logout().expect("connected session should disconnect");
    // Disconnected immediately, before the SDK disconnect finishes
    assert_eq!(manager.state(), SessionState::Disconnected);
    assert!(store.load().is_none());

    handle.await.unwrap();
    assert_eq!(client.disconnects(), 1);

    // Logging out again has nothing left to release
    assert!(manager.logout().is_none());
    manager.shutdown().await;
    drop(manager);
    tokio::task::yield_now().await;
    assert_eq!(client.disconnects(), 1);
}

#[tokio::test]
async fn test_logout_disconnect_failure_is_not_fatal() {
    let client = MockChatClient::new().fail_disconnect("socket already closed");
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "tok",
    )));
    let manager = manager_with(&client, &store);
    manager.start().await;

    manager.logout().unwrap().await.unwrap();

    assert_eq!(manager.state(), SessionState::Disconnected);
    assert_eq!(client.disconnects(), 1);
}

#[tokio::test]
async fn test_shutdown_releases_connection_once() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "tok",
    )));
    let manager = manager_with(&client, &store);
    manager.start().await;

    manager.shutdown().await;
    assert_eq!(client.disconnects(), 1);
    assert_eq!(manager.state(), SessionState::Disconnected);
    // Shutdown keeps credentials for the next start
    assert!(store.load().is_some());

    drop(manager);
    tokio::task::yield_now().await;
    assert_eq!(client.disconnects(), 1);
}

#[tokio::test]
async fn test_drop_while_connected_disconnects() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "tok",
    )));
    let manager = manager_with(&client, &store);
    manager.start().await;

    drop(manager);

    eventually(|| client.disconnects() == 1).await;
    assert_eq!(client.connects(), 1);
}

#[tokio::test]
async fn test_reauthenticate_replaces_connection() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager_with(&client, &store);

    manager
        .authenticated(Credentials::new("alice", "t1"))
        .await
        .unwrap();
    manager
        .authenticated(Credentials::new("bob", "t2"))
        .await
        .unwrap();

    assert_eq!(client.connects(), 2);
    assert_eq!(client.disconnects(), 1);
    assert_eq!(store.load().map(|c| c.user_id), Some("bob".to_string()));
    assert!(manager.is_ready());
}

#[tokio::test]
async fn test_logout_while_connecting_releases_late_connection() {
    let client = MockChatClient::new().held();
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "tok",
    )));
    let manager = Arc::new(manager_with(&client, &store));

    let starting = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.start().await })
    };
    eventually(|| client.connects() == 1).await;
    assert_eq!(manager.state(), SessionState::Connecting);

    // Nothing is live yet, so no disconnect is issued here
    assert!(manager.logout().is_none());
    client.release(1);

    assert_eq!(starting.await.unwrap(), SessionState::Disconnected);
    assert_eq!(manager.state(), SessionState::Disconnected);
    assert_eq!(client.disconnects(), 1);
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_transitions_are_published() {
    let client = MockChatClient::new();
    let store = Arc::new(MemoryCredentialStore::with_credentials(&Credentials::new(
        "u1", "tok",
    )));
    let manager = manager_with(&client, &store);
    let rx = manager.subscribe();

    manager.start().await;
    assert_eq!(rx.borrow().state, SessionState::Connected);

    manager.logout();
    assert_eq!(rx.borrow().state, SessionState::Disconnected);
    assert!(rx.borrow().credentials.is_none());
}

#[tokio::test]
async fn test_overlapping_authentications_keep_newest_connection() {
    let client = MockChatClient::new().park_each();
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = Arc::new(manager_with(&client, &store));

    let alice = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.authenticated(Credentials::new("alice", "t1")).await })
    };
    eventually(|| client.connects() == 1).await;
    let bob = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.authenticated(Credentials::new("bob", "t2")).await })
    };

    // Bob waits behind alice's attempt instead of racing it
    tokio::task::yield_now().await;
    assert!(!client.release_user("bob"));
    assert_eq!(client.connects(), 1);

    assert!(client.release_user("alice"));
    assert_eq!(alice.await.unwrap().unwrap(), SessionState::Connected);
    eventually(|| client.connects() == 2).await;
    assert_eq!(client.disconnects(), 1);

    assert!(client.release_user("bob"));
    assert_eq!(bob.await.unwrap().unwrap(), SessionState::Connected);
    assert_eq!(
        manager.session().credentials,
        Some(Credentials::new("bob", "t2"))
    );
    assert!(client.transport_up());
    assert_eq!(client.disconnects(), 1);

    manager.logout().unwrap().await.unwrap();
    assert!(!client.transport_up());
    assert_eq!(client.disconnects(), 2);
}

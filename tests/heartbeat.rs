//! Heartbeat liveness tests.
//!
//! Run on a paused clock: the runtime jumps straight to the next timer
//! whenever every task is idle.

mod common;

use std::time::Duration;

use common::{MemoryConnector, RemoteEnd, Remotes, chat_config, next_lifecycle, reconnect_config};
use tokio::sync::mpsc::UnboundedReceiver;
use twitchlink::chat::{ChatClient, ChatEvent};
use twitchlink::connection::{ConnectionState, SessionEvent, TransitionOutcome};

const PONG: &str = ":tmi.twitch.tv PONG tmi.twitch.tv :tmi.twitch.tv";

struct Session {
    chat: ChatClient,
    connector: MemoryConnector,
    remotes: Remotes,
    remote: RemoteEnd,
    events: UnboundedReceiver<SessionEvent<ChatEvent>>,
}

/// A ready chat session with the default 60s interval and 10s timeout.
async fn ready_session() -> Session {
    let (connector, mut remotes) = MemoryConnector::new();
    let chat = ChatClient::with_connector(&chat_config(&[]), &reconnect_config(), connector.clone());
    let mut events = chat.subscribe();

    chat.connect().await;
    let mut remote = remotes.next().await;
    remote.accept_chat().await;
    assert_eq!(next_lifecycle(&mut events).await, SessionEvent::Connected);

    Session {
        chat,
        connector,
        remotes,
        remote,
        events,
    }
}

#[tokio::test(start_paused = true)]
async fn test_ping_sent_on_interval() {
    let mut s = ready_session().await;

    assert!(s.remote.silent_for(Duration::from_secs(59)).await);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(s.remote.expect_line().await, "PING :tmi.twitch.tv");
    assert!(s.chat.connection().heartbeat().pending().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_missing_pong_triggers_one_reconnect() {
    let mut s = ready_session().await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(s.remote.expect_line().await, "PING :tmi.twitch.tv");

    // Deadline passes at 70s
    tokio::time::sleep(Duration::from_secs(10)).await;
    let mut second = s.remotes.next().await;
    second.accept_chat().await;
    assert_eq!(next_lifecycle(&mut s.events).await, SessionEvent::Reconnected);

    assert!(!s.remotes.opened_within(Duration::from_secs(30)).await);
    assert_eq!(s.connector.attempts(), 2);
    common::assert_no_lifecycle(&mut s.events, Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_pong_just_before_deadline_keeps_connection() {
    let mut s = ready_session().await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(s.remote.expect_line().await, "PING :tmi.twitch.tv");

    tokio::time::sleep(Duration::from_millis(8_900)).await;
    s.remote.send(PONG);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(s.chat.connection().heartbeat().pending().is_none());
    assert!(!s.remotes.opened_within(Duration::from_secs(1)).await);
    assert_eq!(s.connector.attempts(), 1);
    common::assert_no_lifecycle(&mut s.events, Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_disabling_heartbeat_disarms_deadline() {
    let mut s = ready_session().await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(s.remote.expect_line().await, "PING :tmi.twitch.tv");

    s.chat.connection().set_heartbeat_enabled(false);
    tokio::time::sleep(Duration::from_secs(300)).await;

    assert_eq!(s.connector.attempts(), 1);
    assert!(s.remote.silent_for(Duration::from_secs(1)).await);
    assert!(!s.chat.connection().heartbeat().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_server_ping_is_answered_inline() {
    let mut s = ready_session().await;

    s.remote.send("PING :tmi.twitch.tv");
    assert_eq!(s.remote.expect_line().await, "PONG tmi.twitch.tv");
    // A server ping is not our heartbeat
    assert!(s.chat.connection().heartbeat().pending().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_missing_welcome_triggers_reconnect() {
    let (connector, mut remotes) = MemoryConnector::new();
    let chat = ChatClient::with_connector(&chat_config(&[]), &reconnect_config(), connector.clone());
    let mut events = chat.subscribe();

    chat.connect().await;
    let mut first = remotes.next().await;
    // Transport accepted, handshake never answered
    first.read_handshake().await;
    assert!(!remotes.opened_within(Duration::from_secs(9)).await);

    // Ready deadline passes at 10s
    let mut second = remotes.next().await;
    assert_eq!(first.recv().await, None);
    second.accept_chat().await;
    assert_eq!(next_lifecycle(&mut events).await, SessionEvent::Reconnected);
    assert_eq!(connector.attempts(), 2);

    // The heartbeat takes over once the session is ready
    assert!(!remotes.opened_within(Duration::from_secs(30)).await);
    assert!(chat.connection().heartbeat().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_heartbeat_timeout_is_terminal() {
    let mut s = ready_session().await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(s.remote.expect_line().await, "PING :tmi.twitch.tv");
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(s.chat.disconnect().await, TransitionOutcome::Applied);
    assert_eq!(next_lifecycle(&mut s.events).await, SessionEvent::Disconnected);
    assert_eq!(s.chat.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(s.chat.state(), ConnectionState::Disconnected);
    assert!(!s.chat.connection().heartbeat().has_deadline());
    common::assert_no_lifecycle(&mut s.events, Duration::from_secs(1)).await;
}

//! End-to-end chat session over a real TCP socket.

mod common;

use common::{ScriptedServer, chat_config, next_event, next_lifecycle, reconnect_config};
use twitchlink::chat::{ChatClient, ChatEvent, ClearChatAction};
use twitchlink::config::ChatConfig;
use twitchlink::connection::SessionEvent;
use twitchlink_proto::ModAction;

fn tcp_config(port: u16, channels: &[&str]) -> ChatConfig {
    ChatConfig {
        port,
        ..chat_config(channels)
    }
}

#[tokio::test]
async fn test_chat_session_over_tcp() {
    let server = ScriptedServer::bind().await.expect("bind");
    let chat = ChatClient::from_config(&tcp_config(server.port(), &["Dallas"]), &reconnect_config());
    let mut events = chat.subscribe();

    chat.connect().await;
    let mut conn = server.accept().await.expect("accept");
    let handshake = conn.accept_chat().await.expect("handshake");
    assert_eq!(handshake.last().map(String::as_str), Some("NICK ronni"));
    assert_eq!(conn.expect_line().await.unwrap(), "JOIN #dallas");
    assert_eq!(next_lifecycle(&mut events).await, SessionEvent::Connected);

    conn.send(
        "@badges=subscriber/6;display-name=Fred;id=abc;tmi-sent-ts=1507246572675;user-id=77 \
         :fred!fred@fred.tmi.twitch.tv PRIVMSG #dallas :hello there",
    )
    .await
    .unwrap();
    conn.send("@ban-duration=60 :tmi.twitch.tv CLEARCHAT #dallas :spammer")
        .await
        .unwrap();

    let mut received = Vec::new();
    while received.len() < 2 {
        if let SessionEvent::Protocol(event) = next_event(&mut events).await {
            if !matches!(event, ChatEvent::Welcome { .. }) {
                received.push(event);
            }
        }
    }
    match &received[0] {
        ChatEvent::Privmsg(msg) => {
            assert_eq!(msg.author(), "Fred");
            assert_eq!(msg.text, "hello there");
            assert_eq!(msg.id.as_deref(), Some("abc"));
        }
        other => panic!("expected PRIVMSG, got {:?}", other),
    }
    match &received[1] {
        ChatEvent::ClearChat(clear) => assert_eq!(
            clear.action,
            ClearChatAction::Timeout {
                user: "spammer".into(),
                seconds: 60
            }
        ),
        other => panic!("expected CLEARCHAT, got {:?}", other),
    }

    // Server keepalive is answered by the reader
    conn.send("PING :tmi.twitch.tv").await.unwrap();
    assert_eq!(conn.expect_line().await.unwrap(), "PONG tmi.twitch.tv");

    chat.say("#Dallas", "hi chat").await.unwrap();
    assert_eq!(conn.expect_line().await.unwrap(), "PRIVMSG #dallas :hi chat");

    chat.reply("dallas", "abc", "welcome back").await.unwrap();
    assert_eq!(
        conn.expect_line().await.unwrap(),
        "@reply-parent-msg-id=abc PRIVMSG #dallas :welcome back"
    );

    chat.moderate(
        "dallas",
        &ModAction::Timeout {
            user: "spammer".into(),
            seconds: 600,
            reason: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(
        conn.expect_line().await.unwrap(),
        "PRIVMSG #dallas :/timeout spammer 600"
    );

    chat.join("ronni").await.unwrap();
    assert_eq!(conn.expect_line().await.unwrap(), "JOIN #ronni");
    chat.part("dallas").await.unwrap();
    assert_eq!(conn.expect_line().await.unwrap(), "PART #dallas");
    assert_eq!(chat.channels(), vec!["#ronni".to_string()]);

    chat.disconnect().await;
    assert_eq!(next_lifecycle(&mut events).await, SessionEvent::Disconnected);
    assert_eq!(conn.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_names_listing_is_flushed_once() {
    let server = ScriptedServer::bind().await.expect("bind");
    let chat = ChatClient::from_config(&tcp_config(server.port(), &["dallas"]), &reconnect_config());
    let mut events = chat.subscribe();

    chat.connect().await;
    let mut conn = server.accept().await.expect("accept");
    conn.accept_chat().await.unwrap();
    conn.expect_line().await.unwrap();

    for line in [
        ":ronni!ronni@ronni.tmi.twitch.tv JOIN #dallas",
        ":ronni.tmi.twitch.tv 353 ronni = #dallas :ronni fred",
        ":ronni.tmi.twitch.tv 353 ronni = #dallas :wilma",
        ":ronni.tmi.twitch.tv 366 ronni #dallas :End of /NAMES list",
    ] {
        conn.send(line).await.unwrap();
    }

    let names = loop {
        if let SessionEvent::Protocol(ChatEvent::Names { channel, users }) =
            next_event(&mut events).await
        {
            break (channel, users);
        }
    };
    assert_eq!(names.0, "#dallas");
    assert_eq!(names.1, vec!["ronni", "fred", "wilma"]);
}

#[tokio::test]
async fn test_join_while_disconnected_is_deferred() {
    let server = ScriptedServer::bind().await.expect("bind");
    let chat = ChatClient::from_config(&tcp_config(server.port(), &[]), &reconnect_config());

    chat.join("Dallas").await.unwrap();
    assert_eq!(chat.channels(), vec!["#dallas".to_string()]);

    chat.connect().await;
    let mut conn = server.accept().await.expect("accept");
    conn.accept_chat().await.unwrap();
    assert_eq!(conn.expect_line().await.unwrap(), "JOIN #dallas");
}

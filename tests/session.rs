//! Session controller scenarios driven through a scripted transport.

mod common;

use std::time::Duration;

use futures_util::StreamExt;

use blaze_sdk::error::{ClientError, TransportError};
use blaze_sdk::ws::{
    BlazeClient, ClientOptions, CloseEvent, ConnectOptions, ErrorKind, Event, SessionState,
    TransportSignal, CHAT_MESSAGE, CLOSE, DOUBLE_TICK, ERROR, SUBSCRIPTIONS,
};

use common::{collect, count, data_frame, settle, wait_for, MockTransport, SUBSCRIBE_DOUBLES};

fn client(transport: &MockTransport) -> BlazeClient<MockTransport> {
    BlazeClient::new(transport.clone())
}

async fn open_client_with(client: &BlazeClient<MockTransport>, opts: ConnectOptions) {
    client.connect(opts).await.expect("connect");
    wait_for("open", || client.state() == SessionState::Open).await;
}

async fn open_client(
    transport: &MockTransport,
    opts: ConnectOptions,
) -> BlazeClient<MockTransport> {
    let client = client(transport);
    open_client_with(&client, opts).await;
    client
}

fn double_tick(id: &str, status: &str) -> String {
    data_frame(
        DOUBLE_TICK,
        &format!(r#"{{"id":"{}","status":"{}","color":null,"roll":null}}"#, id, status),
    )
}

fn statuses(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e.as_double_tick().map(|t| t.status.clone()))
        .collect()
}

// ─── Handshake ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_doubles_scenario() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let named = collect(&client, DOUBLE_TICK);
    let raw = collect(&client, "CB:double.tick");

    client
        .connect(ConnectOptions::games("doubles"))
        .await
        .expect("connect");
    wait_for("subscribe", || !transport.sent_commands().is_empty()).await;

    for status in ["waiting", "rolling", "rolling", "complete"] {
        transport.text(double_tick("E1", status)).await;
    }

    wait_for("named events", || count(&named) == 3).await;
    wait_for("raw events", || count(&raw) == 4).await;
    settle().await;

    assert_eq!(count(&named), 3);
    assert_eq!(count(&raw), 4);

    let mut seen = statuses(&named.lock().unwrap());
    seen.sort();
    assert_eq!(seen, vec!["complete", "rolling", "waiting"]);

    assert_eq!(transport.sent_commands(), vec![SUBSCRIBE_DOUBLES]);
}

#[tokio::test]
async fn test_handshake_with_token_sends_three_auth_frames() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let subscriptions = collect(&client, SUBSCRIPTIONS);

    client
        .connect(ConnectOptions::games("crash").with_token("tok"))
        .await
        .expect("connect");
    wait_for("subscriptions", || count(&subscriptions) == 1).await;

    assert_eq!(
        transport.sent_commands(),
        vec![
            r#"420["cmd",{"id":"subscribe","payload":{"room":"crash_room_4"}}]"#,
            r#"423["cmd",{"id":"authenticate","payload":{"token":"tok"}}]"#,
            r#"422["cmd",{"id":"authenticate","payload":{"token":"tok"}}]"#,
            r#"420["cmd",{"id":"authenticate","payload":{"token":"tok"}}]"#,
        ]
    );

    let announced = subscriptions.lock().unwrap()[0].clone();
    match announced {
        Event::Subscriptions(rooms) => assert_eq!(rooms, vec!["crash_room_4".to_string()]),
        other => panic!("expected subscriptions, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_mode_reports_error_event() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let errors = collect(&client, ERROR);
    let subscriptions = collect(&client, SUBSCRIPTIONS);

    let result = client.connect(ConnectOptions::games("unknown-mode")).await;
    assert!(result.is_ok());

    wait_for("error event", || count(&errors) == 1).await;
    wait_for("subscriptions", || count(&subscriptions) == 1).await;
    settle().await;

    let error = errors.lock().unwrap()[0].as_error().cloned().expect("error event");
    assert_eq!(error.kind, ErrorKind::UnknownMode);
    assert!(error.message.contains("unknown-mode"));

    assert!(transport
        .sent()
        .iter()
        .all(|frame| !frame.contains(r#""id":"subscribe""#)));
    let announced = subscriptions.lock().unwrap()[0].clone();
    match announced {
        Event::Subscriptions(rooms) => assert!(rooms.is_empty()),
        other => panic!("expected subscriptions, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_feed_joins_chat_room_without_dedup() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let messages = collect(&client, CHAT_MESSAGE);
    let raw = collect(&client, "CB:chat.message");

    open_client_with(&client, ConnectOptions::chat().with_token("ignored")).await;
    wait_for("subscribe", || !transport.sent_commands().is_empty()).await;

    let payload = r#"{"id":"m1","text":"oi","available":true,"created_at":"2024-01-01T00:00:00.000Z","user":{"id":"u1","username":"joe","rank":"bronze","level":3}}"#;
    transport.text(data_frame(CHAT_MESSAGE, payload)).await;
    transport.text(data_frame(CHAT_MESSAGE, payload)).await;

    wait_for("chat messages", || count(&messages) == 2).await;
    settle().await;
    assert_eq!(count(&raw), 0);
    assert_eq!(
        transport.sent_commands(),
        vec![r#"420["cmd",{"id":"subscribe","payload":{"room":"chat_room_2"}}]"#]
    );
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_dedup_disabled_emits_every_status() {
    let transport = MockTransport::new();
    let client = BlazeClient::with_options(
        transport.clone(),
        ClientOptions::default().with_dedup(false),
    );
    let named = collect(&client, DOUBLE_TICK);
    let raw = collect(&client, "CB:double.tick");

    open_client_with(&client, ConnectOptions::games("doubles")).await;
    for status in ["waiting", "waiting", "waiting"] {
        transport.text(double_tick("E1", status)).await;
    }

    wait_for("named events", || count(&named) == 3).await;
    settle().await;
    assert_eq!(count(&raw), 0);
}

#[tokio::test]
async fn test_control_frames_are_filtered() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let mut events = client.events();

    open_client_with(&client, ConnectOptions::games("doubles")).await;
    transport.text("3").await;
    transport.text(r#"0{"sid":"x"}"#).await;
    transport.text("40").await;
    transport.text(double_tick("E9", "waiting")).await;

    let mut names = Vec::new();
    while names.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(2), events.next())
            .await
            .expect("event in time")
            .expect("stream open");
        names.push(event.name);
    }
    assert_eq!(names, vec![SUBSCRIPTIONS, "CB:double.tick", DOUBLE_TICK]);
}

// ─── Synchronous connect errors ──────────────────────────────────────────────

#[tokio::test]
async fn test_missing_address_fails_fast() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let errors = collect(&client, ERROR);

    let err = client.connect(ConnectOptions::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingAddress));

    let err = client
        .connect(ConnectOptions::default().with_address(""))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::MissingAddress));

    settle().await;
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(transport.connect_count(), 0);
    assert_eq!(count(&errors), 0);
}

#[tokio::test]
async fn test_transport_connect_failure_is_synchronous() {
    let transport = MockTransport::new();
    transport.fail_next_connects(1);
    let client = client(&transport);
    let closes = collect(&client, CLOSE);

    let err = client
        .connect(ConnectOptions::games("crash"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::ConnectionFailed(_))
    ));

    settle().await;
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(count(&closes), 0);
    assert!(matches!(client.disconnect().await, Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn test_connect_sends_merged_headers() {
    let transport = MockTransport::new();
    let client = client(&transport);

    client
        .connect(
            ConnectOptions::games("crash")
                .with_header("User-Agent", "bot/1.0")
                .with_host("api-v2.blaze1.space"),
        )
        .await
        .expect("connect");

    let (address, headers) = transport.connects().remove(0);
    assert_eq!(address, blaze_sdk::network::GAMES_WS_URL);
    let value = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };
    assert_eq!(value("user-agent").as_deref(), Some("bot/1.0"));
    assert_eq!(value("host").as_deref(), Some("api-v2.blaze1.space"));
    assert_eq!(value("origin").as_deref(), Some("https://api-gaming.blaze.com"));
}

// ─── Close, disconnect, reconnect ────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_twice_reports_not_connected() {
    let transport = MockTransport::new();
    let client = open_client(&transport, ConnectOptions::games("crash")).await;
    let closes = collect(&client, CLOSE);

    client.disconnect().await.expect("first disconnect");
    assert_eq!(client.state(), SessionState::Disconnected);

    let second = client.disconnect().await;
    assert!(matches!(second, Err(ClientError::NotConnected)));

    wait_for("close event", || count(&closes) == 1).await;
    assert_eq!(
        closes.lock().unwrap()[0].as_close(),
        Some(&CloseEvent {
            code: 1000,
            reconnect: false
        })
    );
    assert_eq!(transport.disconnect_count(), 1);
}

#[tokio::test]
async fn test_server_close_without_reconnect() {
    let transport = MockTransport::new();
    let client = open_client(&transport, ConnectOptions::games("crash")).await;
    let closes = collect(&client, CLOSE);

    transport.server_close(None).await;

    wait_for("disconnected", || client.state() == SessionState::Disconnected).await;
    wait_for("close event", || count(&closes) == 1).await;
    assert_eq!(
        closes.lock().unwrap()[0].as_close(),
        Some(&CloseEvent {
            code: 1000,
            reconnect: false
        })
    );

    settle().await;
    assert_eq!(transport.connect_count(), 1);
    assert!(matches!(client.disconnect().await, Err(ClientError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_reuses_parameters_and_restarts_keepalive() {
    let transport = MockTransport::new();
    let opts = ConnectOptions::games("doubles")
        .with_reconnect(true)
        .with_token("tok")
        .with_keepalive_interval(Duration::from_millis(200));
    let client = open_client(&transport, opts).await;
    let closes = collect(&client, CLOSE);

    transport.server_close(Some(1006)).await;

    wait_for("close event", || count(&closes) == 1).await;
    assert_eq!(
        closes.lock().unwrap()[0].as_close(),
        Some(&CloseEvent {
            code: 1006,
            reconnect: true
        })
    );

    wait_for("second connect", || transport.connect_count() == 2).await;
    wait_for("reopened", || client.state() == SessionState::Open).await;

    let connects = transport.connects();
    assert_eq!(connects[0], connects[1]);

    // Handshake repeated on the new connection.
    let subscribes = transport
        .sent_commands()
        .iter()
        .filter(|f| f.as_str() == SUBSCRIBE_DOUBLES)
        .count();
    assert_eq!(subscribes, 2);

    let before = transport.heartbeats();
    tokio::time::sleep(Duration::from_millis(1_050)).await;
    let after = transport.heartbeats();
    assert!((4..=6).contains(&(after - before)), "sent {}", after - before);

    client.disconnect().await.expect("disconnect");
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_delay_is_short() {
    let transport = MockTransport::new();
    let client = open_client(
        &transport,
        ConnectOptions::games("crash").with_reconnect(true),
    )
    .await;

    let closed_at = tokio::time::Instant::now();
    transport.server_close(Some(1001)).await;
    wait_for("second connect", || transport.connect_count() == 2).await;

    let waited = closed_at.elapsed();
    assert!(waited >= Duration::from_millis(100), "waited {:?}", waited);
    assert!(waited < Duration::from_millis(300), "waited {:?}", waited);

    client.disconnect().await.expect("disconnect");
}

#[tokio::test(start_paused = true)]
async fn test_explicit_disconnect_never_reconnects() {
    let transport = MockTransport::new();
    let client = open_client(
        &transport,
        ConnectOptions::games("crash").with_reconnect(true),
    )
    .await;
    let closes = collect(&client, CLOSE);

    client.disconnect().await.expect("disconnect");
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(transport.connect_count(), 1);
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(
        closes.lock().unwrap()[0].as_close(),
        Some(&CloseEvent {
            code: 1000,
            reconnect: false
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnects_give_up() {
    let transport = MockTransport::new();
    let client = open_client(
        &transport,
        ConnectOptions::games("crash")
            .with_reconnect(true)
            .with_max_reconnect_attempts(2),
    )
    .await;
    let errors = collect(&client, ERROR);
    let closes = collect(&client, CLOSE);

    transport.fail_next_connects(5);
    transport.server_close(None).await;

    wait_for("gave up", || {
        transport.connect_count() == 3 && client.state() == SessionState::Disconnected
    })
    .await;
    wait_for("reconnect errors", || count(&errors) == 2).await;

    let kinds: Vec<ErrorKind> = errors
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_error().map(|err| err.kind))
        .collect();
    assert_eq!(kinds, vec![ErrorKind::Reconnect, ErrorKind::Reconnect]);

    // The close that promised a retry is followed by a final one.
    wait_for("final close", || count(&closes) == 2).await;
    let flags: Vec<bool> = closes
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_close().map(|c| c.reconnect))
        .collect();
    assert_eq!(flags, vec![true, false]);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.connect_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_backoff_ends_with_final_close() {
    let transport = MockTransport::new();
    let client = open_client(
        &transport,
        ConnectOptions::games("crash")
            .with_reconnect(true)
            .with_reconnect_delay(Duration::from_secs(5)),
    )
    .await;
    let closes = collect(&client, CLOSE);

    transport.server_close(Some(1006)).await;
    wait_for("retry close", || count(&closes) == 1).await;

    client.disconnect().await.expect("disconnect");
    assert_eq!(client.state(), SessionState::Disconnected);

    wait_for("final close", || count(&closes) == 2).await;
    let seen: Vec<CloseEvent> = closes
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_close().cloned())
        .collect();
    assert_eq!(
        seen,
        vec![
            CloseEvent {
                code: 1006,
                reconnect: true
            },
            CloseEvent {
                code: 1000,
                reconnect: false
            },
        ]
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_shutdown_is_aborted_with_close() {
    let transport = MockTransport::new();
    let client = open_client(&transport, ConnectOptions::games("crash")).await;
    let closes = collect(&client, CLOSE);

    transport.stuck_disconnect();
    client.disconnect().await.expect("disconnect");
    assert_eq!(client.state(), SessionState::Disconnected);

    wait_for("close event", || count(&closes) == 1).await;
    assert_eq!(
        closes.lock().unwrap()[0].as_close(),
        Some(&CloseEvent {
            code: 1000,
            reconnect: false
        })
    );
}

#[tokio::test]
async fn test_dedup_cache_survives_reconnect() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let named = collect(&client, DOUBLE_TICK);

    open_client_with(&client, ConnectOptions::games("doubles").with_reconnect(true)).await;
    transport.text(double_tick("E1", "rolling")).await;
    wait_for("first tick", || count(&named) == 1).await;

    transport.server_close(None).await;
    wait_for("reconnected", || transport.connect_count() == 2).await;
    wait_for("reopened", || client.state() == SessionState::Open).await;

    transport.text(double_tick("E1", "rolling")).await;
    transport.text(double_tick("E1", "complete")).await;
    wait_for("complete tick", || count(&named) == 2).await;
    settle().await;

    assert_eq!(statuses(&named.lock().unwrap()), vec!["rolling", "complete"]);
    client.disconnect().await.expect("disconnect");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocked_callbacks_do_not_delay_other_events() {
    let transport = MockTransport::new();
    let client = open_client(&transport, ConnectOptions::games("doubles")).await;

    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = std::sync::Arc::new(std::sync::Mutex::new(release_rx));
    for _ in 0..2 {
        let release_rx = std::sync::Arc::clone(&release_rx);
        client.on(DOUBLE_TICK, move |_| {
            let rx = release_rx.lock().unwrap();
            let _ = rx.recv_timeout(Duration::from_secs(5));
        });
    }
    let others = collect(&client, "other.event");

    let start = std::time::Instant::now();
    transport.text(double_tick("E1", "waiting")).await;
    transport.text(data_frame("other.event", r#"{"n":1}"#)).await;

    wait_for("unrelated event", || count(&others) == 1).await;
    assert!(start.elapsed() < Duration::from_millis(500), "took {:?}", start.elapsed());

    drop(release_tx);
    client.disconnect().await.expect("disconnect");
}

// ─── Keepalive ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_keepalive_runs_only_while_open() {
    let transport = MockTransport::new().manual_open();
    let client = client(&transport);

    client
        .connect(
            ConnectOptions::games("crash").with_keepalive_interval(Duration::from_millis(100)),
        )
        .await
        .expect("connect");

    // No heartbeat before Open.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(transport.heartbeats(), 0);
    assert_eq!(client.state(), SessionState::Connecting);

    transport.open().await;
    wait_for("open", || client.state() == SessionState::Open).await;

    let start = transport.heartbeats();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let sent = transport.heartbeats() - start;
    assert!((9..=11).contains(&sent), "sent {} heartbeats", sent);

    transport.server_close(None).await;
    wait_for("disconnected", || client.state() == SessionState::Disconnected).await;

    let after_close = transport.heartbeats();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.heartbeats(), after_close);
}

// ─── Misc ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_requires_open_session() {
    let transport = MockTransport::new();
    let client = client(&transport);

    assert!(matches!(client.send("2").await, Err(ClientError::NotConnected)));

    open_client_with(&client, ConnectOptions::games("crash")).await;
    client.send(r#"421["cmd",{"id":"ping"}]"#).await.expect("send");
    assert!(transport
        .sent_commands()
        .contains(&r#"421["cmd",{"id":"ping"}]"#.to_string()));

    client.disconnect().await.expect("disconnect");
}

#[tokio::test]
async fn test_transport_error_signal_becomes_error_event() {
    let transport = MockTransport::new();
    let client = open_client(&transport, ConnectOptions::games("crash")).await;
    let errors = collect(&client, ERROR);

    transport
        .signal(TransportSignal::Error(TransportError::Protocol("bad frame".into())))
        .await;

    wait_for("error event", || count(&errors) == 1).await;
    let error = errors.lock().unwrap()[0].as_error().cloned().expect("error");
    assert_eq!(error.kind, ErrorKind::Transport);
    assert!(error.message.contains("bad frame"));
    assert_eq!(client.state(), SessionState::Open);
}

#[test]
fn test_client_built_outside_runtime() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let subscriptions = collect(&client, SUBSCRIPTIONS);

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        open_client_with(&client, ConnectOptions::games("crash")).await;
        wait_for("subscriptions", || count(&subscriptions) == 1).await;
        client.disconnect().await.expect("disconnect");
    });
}

#[tokio::test]
async fn test_local_emit_reaches_callbacks() {
    let transport = MockTransport::new();
    let client = client(&transport);
    let closes = collect(&client, CLOSE);

    client.emit(
        CLOSE,
        Event::Close(CloseEvent {
            code: 4000,
            reconnect: false,
        }),
    );

    wait_for("close event", || count(&closes) == 1).await;
    assert_eq!(closes.lock().unwrap()[0].as_close().map(|c| c.code), Some(4000));
}

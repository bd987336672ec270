//! Event channel manager against a local WebSocket server.
//!
//! The server handles one connection at a time and logs when a session opens
//! (with the token it was opened with) and when it ends, so session ordering
//! can be asserted from the outside.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use inventory_client::{
    AuthContext, ChannelStatus, ClientConfig, ConnectionState, Credential, EventChannelManager,
    InventoryFeed, ReconnectConfig,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Session {
    Opened(String),
    Closed(String),
}

struct TestServer {
    addr: SocketAddr,
    log: mpsc::UnboundedReceiver<Session>,
    frames: mpsc::UnboundedSender<String>,
    kick: mpsc::UnboundedSender<()>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (log_tx, log) = mpsc::unbounded_channel();
        let (frames, mut frame_rx) = mpsc::unbounded_channel::<String>();
        let (kick, mut kick_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let mut token = String::new();
                let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    token = token_of(req);
                    Ok(resp)
                };
                let Ok(mut ws) = accept_hdr_async(tcp, callback).await else {
                    continue;
                };
                let _ = log_tx.send(Session::Opened(token.clone()));

                loop {
                    tokio::select! {
                        msg = ws.next() => match msg {
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                        frame = frame_rx.recv() => match frame {
                            Some(text) => {
                                if ws.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                        _ = kick_rx.recv() => break,
                    }
                }

                let _ = log_tx.send(Session::Closed(token));
            }
        });

        Self {
            addr,
            log,
            frames,
            kick,
        }
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_channel_base(format!("ws://{}/api/ws", self.addr))
            .with_reconnect(fast_reconnect(5))
    }

    fn send(&self, frame: &str) {
        self.frames.send(frame.to_string()).unwrap();
    }

    async fn next_session(&mut self) -> Session {
        timeout(WAIT, self.log.recv())
            .await
            .expect("timed out waiting for session log")
            .expect("server stopped")
    }
}

fn token_of(req: &Request) -> String {
    let query = req.uri().query().unwrap_or_default();
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        max_attempts,
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        backoff_multiplier: 2.0,
        stable_after: Duration::from_secs(1),
    }
}

async fn wait_status(feed: &mut InventoryFeed, status: ChannelStatus) {
    assert!(
        timeout(WAIT, feed.wait_for_status(status)).await.expect("status timeout"),
        "manager dropped while waiting for {status:?}"
    );
}

async fn wait_event(feed: &mut InventoryFeed, sku: &str) -> inventory_shared::InventoryUpdateEvent {
    timeout(WAIT, feed.wait_for_event(|event| event.sku == sku))
        .await
        .expect("event timeout")
        .expect("manager dropped")
}

#[tokio::test]
async fn token_switch_retires_old_session_before_opening_new() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    assert_eq!(manager.status(), ChannelStatus::Disconnected);
    assert_eq!(manager.latest_event(), None);

    auth.login("tok1");
    assert_eq!(server.next_session().await, Session::Opened("tok1".into()));
    wait_status(&mut feed, ChannelStatus::Connected).await;

    server.send(r#"{"sku":"A","delta":-3}"#);
    let event = wait_event(&mut feed, "A").await;
    assert_eq!(event.delta, Some(-3));
    assert_eq!(manager.latest_event(), Some(event));

    auth.login("tok2");
    assert_eq!(server.next_session().await, Session::Closed("tok1".into()));
    assert_eq!(server.next_session().await, Session::Opened("tok2".into()));
    wait_status(&mut feed, ChannelStatus::Connected).await;
}

#[tokio::test]
async fn logout_tears_down_session_and_clears_event() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    auth.login("tok1");
    assert_eq!(server.next_session().await, Session::Opened("tok1".into()));
    wait_status(&mut feed, ChannelStatus::Connected).await;
    server.send(r#"{"sku":"A","delta":1}"#);
    wait_event(&mut feed, "A").await;

    auth.logout();
    assert_eq!(server.next_session().await, Session::Closed("tok1".into()));
    wait_status(&mut feed, ChannelStatus::Disconnected).await;
    assert_eq!(manager.latest_event(), None);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn credential_sequence_ending_absent_leaves_no_session() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    let mut previous: Option<&str> = None;
    for token in ["a", "b", "c"] {
        auth.login(token);
        if let Some(previous) = previous {
            assert_eq!(server.next_session().await, Session::Closed(previous.into()));
        }
        assert_eq!(server.next_session().await, Session::Opened(token.into()));
        wait_status(&mut feed, ChannelStatus::Connected).await;
        previous = Some(token);
    }

    auth.logout();
    assert_eq!(server.next_session().await, Session::Closed("c".into()));
    wait_status(&mut feed, ChannelStatus::Disconnected).await;
    assert_eq!(manager.latest_event(), None);
}

#[tokio::test]
async fn resending_the_same_credential_keeps_the_session() {
    let mut server = TestServer::start().await;
    let (credentials, rx) = watch::channel(None);
    let manager = EventChannelManager::spawn(server.config(), rx);
    let mut feed = manager.subscribe();

    credentials.send_replace(Some(Credential::new("tok1")));
    assert_eq!(server.next_session().await, Session::Opened("tok1".into()));
    wait_status(&mut feed, ChannelStatus::Connected).await;

    credentials.send_replace(Some(Credential::new("tok1")));
    server.send(r#"{"sku":"after","delta":2}"#);
    wait_event(&mut feed, "after").await;

    assert!(server.log.try_recv().is_err(), "session was recycled");
    assert_eq!(manager.status(), ChannelStatus::Connected);
}

#[tokio::test]
async fn malformed_frames_do_not_change_latest_event() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    auth.login("tok1");
    server.next_session().await;
    wait_status(&mut feed, ChannelStatus::Connected).await;

    server.send(r#"{"sku":"e1","delta":1}"#);
    server.send("not json");
    server.send(r#"{"sku":"e2","delta":2}"#);
    server.send(r#"{"delta":5}"#);
    server.send(r#"{"sku":"e3","delta":-7,"store_id":"s1"}"#);
    let last = wait_event(&mut feed, "e3").await;
    assert_eq!(last.delta, Some(-7));
    assert_eq!(last.store_id.as_deref(), Some("s1"));

    server.send("{");
    server.send("[]");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(manager.latest_event(), Some(last));
    assert_eq!(manager.status(), ChannelStatus::Connected);
}

#[tokio::test]
async fn clearing_the_event_keeps_the_session() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    auth.login("tok1");
    server.next_session().await;
    wait_status(&mut feed, ChannelStatus::Connected).await;
    server.send(r#"{"sku":"A","delta":1}"#);
    wait_event(&mut feed, "A").await;

    feed.clear_last_event();
    assert_eq!(manager.latest_event(), None);
    assert_eq!(manager.status(), ChannelStatus::Connected);

    // Clearing again is a no-op.
    manager.clear_last_event();
    assert_eq!(feed.latest_event(), None);

    server.send(r#"{"sku":"B","delta":4}"#);
    assert_eq!(wait_event(&mut feed, "B").await.delta, Some(4));
}

#[tokio::test]
async fn dropped_transport_is_reopened_with_the_same_credential() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    auth.login("tok1");
    assert_eq!(server.next_session().await, Session::Opened("tok1".into()));
    wait_status(&mut feed, ChannelStatus::Connected).await;

    server.kick.send(()).unwrap();
    assert_eq!(server.next_session().await, Session::Closed("tok1".into()));
    assert_eq!(server.next_session().await, Session::Opened("tok1".into()));
    wait_status(&mut feed, ChannelStatus::Connected).await;
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn gives_up_after_retry_budget_until_credential_changes() {
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = unused.local_addr().unwrap();
    drop(unused);

    let config = ClientConfig::default()
        .with_channel_base(format!("ws://{addr}/api/ws"))
        .with_reconnect(fast_reconnect(2));
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(config, auth.watch());
    let mut feed = manager.subscribe();

    auth.login("tok1");
    let failed = timeout(WAIT, async {
        loop {
            if matches!(feed.state(), ConnectionState::Failed { .. }) {
                return true;
            }
            if !feed.changed().await {
                return false;
            }
        }
    })
    .await
    .expect("never gave up");
    assert!(failed);
    assert_eq!(manager.status(), ChannelStatus::Disconnected);

    auth.logout();
    timeout(WAIT, async {
        while feed.state() != ConnectionState::Disconnected {
            feed.changed().await;
        }
    })
    .await
    .expect("failure not cleared on logout");
}

/// Accepts every upgrade and closes it straight away, counting sessions.
async fn start_closing_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = opened.clone();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = ws.close(None).await;
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    (addr, opened)
}

#[tokio::test]
async fn sessions_closed_right_after_open_exhaust_the_retry_budget() {
    let (addr, opened) = start_closing_server().await;
    let config = ClientConfig::default()
        .with_channel_base(format!("ws://{addr}/api/ws"))
        .with_reconnect(fast_reconnect(2));
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(config, auth.watch());
    let mut feed = manager.subscribe();

    auth.login("rejected");
    timeout(WAIT, async {
        while !matches!(feed.state(), ConnectionState::Failed { .. }) {
            assert!(feed.changed().await, "manager dropped");
        }
    })
    .await
    .expect("kept reconnecting to a server that closes every session");

    // The first open plus two retries.
    assert_eq!(opened.load(Ordering::SeqCst), 3);
    assert_eq!(manager.status(), ChannelStatus::Disconnected);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(opened.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn events_without_delta_are_delivered_with_unknown_fields() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    auth.login("tok1");
    server.next_session().await;
    wait_status(&mut feed, ChannelStatus::Connected).await;

    server.send(r#"{"sku":"A","quantity":12,"type":"restock","batch":"b-7"}"#);
    let event = wait_event(&mut feed, "A").await;
    assert_eq!(event.delta, None);
    assert_eq!(event.quantity, Some(12));
    assert_eq!(event.event_type.as_deref(), Some("restock"));
    assert_eq!(event.extra.get("batch").and_then(|v| v.as_str()), Some("b-7"));
}

#[tokio::test]
async fn unresolvable_address_stays_disconnected() {
    let config = ClientConfig::default().with_channel_base("/api/ws");
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(config, auth.watch());

    auth.login("tok1");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.latest_event(), None);
}

#[tokio::test]
async fn dropping_the_manager_closes_the_session() {
    let mut server = TestServer::start().await;
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(server.config(), auth.watch());
    let mut feed = manager.subscribe();

    auth.login("tok1");
    server.next_session().await;
    wait_status(&mut feed, ChannelStatus::Connected).await;

    manager.shutdown();
    assert_eq!(server.next_session().await, Session::Closed("tok1".into()));
    assert_eq!(feed.status(), ChannelStatus::Disconnected);

    // Nothing is published after disposal.
    server.send(r#"{"sku":"late","delta":1}"#);
    auth.login("tok2");
    timeout(WAIT, async { while feed.changed().await {} })
        .await
        .expect("feed outlived the manager");
    assert_eq!(feed.latest_event(), None);
    assert_eq!(feed.status(), ChannelStatus::Disconnected);
}

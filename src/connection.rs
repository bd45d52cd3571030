use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, trace};

use crate::error::{CdpError, CdpResult};
use crate::pending::PendingCalls;
use crate::protocol::{self, IncomingFrame};
use crate::router::{EventRouter, EventStream, TypedEvents};
use crate::runtime::Runtime;
use crate::transport::Transport;

/// Tuning knobs for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Local deadline applied to every command. `None` waits on the browser
    /// indefinitely. Expiry fails only the local caller; the pending entry is
    /// removed, so a response arriving after the deadline is discarded.
    pub command_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// One debugging connection, the single owner of its transport.
///
/// Cheap to clone; every clone shares the writer, the pending-call table and
/// the event router. All protocol domains are multiplexed over the one
/// transport: commands go out with a connection-unique id, responses resolve
/// their caller by that id whenever and in whatever order they arrive, and
/// unsolicited events fan out to the subscribers of their method name.
///
/// Closure is terminal. Once the transport closes or errors, every command
/// still in flight fails with [`CdpError::ConnectionClosed`], later sends fail
/// the same way without touching the transport, and all event streams end.
/// Open a new connection to recover.
#[derive(Clone)]
pub struct Connection {
    command_tx: mpsc::UnboundedSender<String>,
    pending: Arc<PendingCalls>,
    router: Arc<EventRouter>,
    closed: Arc<AtomicBool>,
    config: ConnectionConfig,
}

impl Connection {
    /// Takes ownership of `transport` and spawns the writer and reader tasks
    /// that drive it.
    pub fn new(transport: Transport, config: ConnectionConfig) -> Self {
        let Transport {
            mut outgoing,
            mut incoming,
        } = transport;

        let pending = Arc::new(PendingCalls::new());
        let router = Arc::new(EventRouter::new());
        let closed = Arc::new(AtomicBool::new(false));

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<String>();

        let writer_pending = Arc::clone(&pending);
        let writer_router = Arc::clone(&router);
        let writer_closed = Arc::clone(&closed);

        tokio::spawn(async move {
            let result: CdpResult<()> = async {
                while let Some(json_str) = command_rx.recv().await {
                    trace!("About to send command {}", json_str);
                    outgoing.send(json_str).await?;
                }
                Ok(())
            }
            .await;

            if let Err(e) = result {
                error!("Fatal error in writer task: {}", e);
                // A connection that cannot write anymore is terminal even if
                // the incoming half never signals the close.
                writer_closed.store(true, Ordering::SeqCst);
                writer_pending.fail_all();
                writer_router.clear();
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_router = Arc::clone(&router);
        let reader_closed = Arc::clone(&closed);

        tokio::spawn(async move {
            let reader_result: CdpResult<()> = async {
                while let Some(frame) = incoming.next().await {
                    let text = frame.map_err(CdpError::from)?;
                    dispatch(&reader_pending, &reader_router, &text);
                }
                Ok(())
            }
            .await;

            reader_closed.store(true, Ordering::SeqCst);

            match reader_result {
                Err(e) => debug!("Connection lost due to error: {}", e),
                Ok(_) => debug!("Connection closed by server/gracefully"),
            }

            reader_pending.fail_all();
            reader_router.clear();
        });

        Self {
            command_tx,
            pending,
            router,
            closed,
            config,
        }
    }

    /// Connects over WebSocket with the default configuration.
    pub async fn connect(url: &str) -> CdpResult<Self> {
        Self::connect_with(url, ConnectionConfig::default()).await
    }

    /// Connects over WebSocket.
    pub async fn connect_with(url: &str, config: ConnectionConfig) -> CdpResult<Self> {
        let transport = Transport::websocket(url).await?;
        Ok(Self::new(transport, config))
    }

    /// True once the transport has closed or errored. Terminal.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Issues one command and waits for its correlated response, yielding the
    /// response's `result` payload (an empty object when the browser sends a
    /// success with no `result` member).
    ///
    /// Concurrent callers each get an independent id and an independent
    /// completion; responses resolve in whatever order the browser answers.
    /// An error response becomes [`CdpError::Protocol`], a missed deadline
    /// [`CdpError::CommandTimeout`].
    pub async fn send_command<P: Serialize>(&self, method: &str, params: P) -> CdpResult<Value> {
        if self.is_closed() {
            return Err(CdpError::ConnectionClosed);
        }

        let (id, rx) = self.pending.register()?;

        // Closure may have swept the table between the check above and the
        // registration; never leave an entry nobody will resolve.
        if self.is_closed() {
            self.pending.forget(id);
            return Err(CdpError::ConnectionClosed);
        }

        let json_payload = match protocol::encode(id, method, params) {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.forget(id);
                return Err(e);
            }
        };

        if self.command_tx.send(json_payload).is_err() {
            // Writer task is gone, the connection is as good as closed.
            self.closed.store(true, Ordering::SeqCst);
            self.pending.forget(id);
            return Err(CdpError::ConnectionClosed);
        }
        trace!("Command {} queued with id {}", method, id);

        match self.config.command_timeout {
            Some(limit) => match timeout(limit, rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(CdpError::ConnectionClosed),
                Err(_) => {
                    self.pending.forget(id);
                    Err(CdpError::CommandTimeout {
                        method: method.to_string(),
                        timeout: limit,
                    })
                }
            },
            None => match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(CdpError::ConnectionClosed),
            },
        }
    }

    /// Subscribes to every event named `method` (fully qualified, e.g.
    /// `"Runtime.consoleAPICalled"`). Only events dispatched while the
    /// subscription exists are delivered; there is no replay. On a closed
    /// connection the returned stream is already ended.
    pub fn subscribe(&self, method: &str) -> EventStream {
        Arc::clone(&self.router).subscribe(method)
    }

    /// [`subscribe`](Self::subscribe), decoding each payload into `T`.
    pub fn subscribe_typed<T: DeserializeOwned>(&self, method: &str) -> TypedEvents<T> {
        TypedEvents::new(self.subscribe(method), method)
    }

    /// Typed facade over the `Runtime` domain of this connection.
    pub fn runtime(&self) -> Runtime {
        Runtime::new(self.clone())
    }
}

fn dispatch(pending: &PendingCalls, router: &EventRouter, text: &str) {
    match protocol::decode(text) {
        Ok(IncomingFrame::Response(response)) => {
            let id = response.id;
            let outcome = match response.error {
                Some(e) => Err(CdpError::Protocol {
                    code: e.code,
                    message: e.message,
                }),
                None => Ok(response.result.unwrap_or_else(protocol::empty_object)),
            };
            if pending.complete(id, outcome) {
                trace!("Received expected id {} from CDP", id);
            } else {
                trace!("Discarded message with id {} (no listener found)", id);
            }
        }
        Ok(IncomingFrame::Event(event)) => {
            trace!("CDP Event: {}", event.method);
            router.publish(&event.method, event.params);
        }
        Err(e) => {
            debug!("Discarding inbound frame ({}): {}", e, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_connection() -> (Connection, crate::transport::FakePeer) {
        let (transport, peer) = Transport::pair();
        (Connection::new(transport, ConnectionConfig::default()), peer)
    }

    #[tokio::test]
    async fn test_out_of_order_responses_resolve_by_id() {
        let (client, mut peer) = test_connection();

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.send_command("Page.enable", json!({})).await }
        });
        let second = tokio::spawn({
            let client = client.clone();
            async move { client.send_command("Runtime.enable", json!({})).await }
        });

        let a = peer.recv_json().await;
        let b = peer.recv_json().await;
        assert_ne!(a["id"], b["id"], "❌ Concurrent commands shared an id");

        // Answer in the opposite order; each response echoes its command name.
        peer.respond(b["id"].as_u64().unwrap(), json!({"for": b["method"]}));
        peer.respond(a["id"].as_u64().unwrap(), json!({"for": a["method"]}));

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first["for"], "Page.enable");
        assert_eq!(second["for"], "Runtime.enable");
        println!("✅ Out-of-order responses reached their callers");
    }

    #[tokio::test]
    async fn test_missing_result_normalizes_to_empty_object() {
        let (client, mut peer) = test_connection();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.send_command("Page.enable", json!({})).await }
        });

        let sent = peer.recv_json().await;
        peer.push_json(json!({"id": sent["id"]}));

        assert_eq!(call.await.unwrap().unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_protocol_error_mapping() {
        let (client, mut peer) = test_connection();

        let handle = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .send_command("Page.navigate", json!({"url": "invalid-url"}))
                    .await
            }
        });

        // Simulate response with error in Browser
        let sent = peer.recv_json().await;
        peer.push_json(json!({
            "id": sent["id"],
            "error": {"code": -32000, "message": "Cannot navigate to invalid URL"}
        }));

        let result = handle.await.unwrap();
        match result {
            Err(CdpError::Protocol { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "Cannot navigate to invalid URL");
                println!("✅ Protocol Error mapped correctly");
            }
            other => panic!("❌ Expected Protocol error, but got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_timeout_and_cleanup() {
        let (transport, mut peer) = Transport::pair();
        let client = Connection::new(
            transport,
            ConnectionConfig {
                command_timeout: Some(Duration::from_millis(100)),
            },
        );

        let result = client
            .send_command("Page.navigate", json!({"url": "about:blank"}))
            .await;

        match result {
            Err(CdpError::CommandTimeout { method, .. }) => {
                assert_eq!(method, "Page.navigate");
                println!("✅ Timeout detected successfully");
            }
            other => panic!("❌ Expected CommandTimeout, but got: {:?}", other),
        }

        assert_eq!(client.pending.len(), 0, "❌ ID was not removed from table");
        println!("✅ Pending table is clean, no memory leaks");

        // The late response finds no listener and the connection keeps working.
        let sent = peer.recv_json().await;
        peer.respond(sent["id"].as_u64().unwrap(), json!({}));

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.send_command("Page.enable", json!({})).await }
        });
        let sent = peer.recv_json().await;
        peer.respond(sent["id"].as_u64().unwrap(), json!({"ok": true}));
        assert_eq!(call.await.unwrap().unwrap()["ok"], true);
        println!("✅ Late response discarded without side effects");
    }

    #[tokio::test]
    async fn test_connection_drop_fails_pending_and_later_sends() {
        let (transport, mut peer) = Transport::pair();
        let client = Connection::new(
            transport,
            ConnectionConfig {
                command_timeout: None,
            },
        );

        let handles: Vec<_> = (0..3)
            .map(|_| {
                tokio::spawn({
                    let client = client.clone();
                    async move { client.send_command("Debugger.enable", json!({})).await }
                })
            })
            .collect();

        // All three are on the wire before the cut.
        for _ in 0..3 {
            peer.recv_json().await;
        }

        // Simulate a sudden disconnection
        drop(peer.push);

        for handle in handles {
            match handle.await.unwrap() {
                Err(CdpError::ConnectionClosed) => {}
                other => panic!("❌ Expected ConnectionClosed, but got: {:?}", other),
            }
        }
        println!("✅ Every pending request failed on disconnect");

        assert!(client.is_closed());
        match client.send_command("Page.enable", json!({})).await {
            Err(CdpError::ConnectionClosed) => {}
            other => panic!("❌ Expected ConnectionClosed, but got: {:?}", other),
        }
        // Nothing further reached the transport.
        assert!(peer.sent.try_recv().is_err());
        println!("✅ Post-close send failed fast without touching the transport");
    }

    #[tokio::test]
    async fn test_writer_failure_fails_pending_calls() {
        let (transport, peer) = Transport::pair();
        let client = Connection::new(
            transport,
            ConnectionConfig {
                command_timeout: None,
            },
        );

        // Kill only the outgoing half; the incoming half stays open, so no
        // close signal ever arrives from the peer.
        drop(peer.sent);

        match client.send_command("Page.enable", json!({})).await {
            Err(CdpError::ConnectionClosed) => {}
            other => panic!("❌ Expected ConnectionClosed, but got: {:?}", other),
        }
        println!("✅ Queued command failed when the write half died");

        assert!(client.is_closed());
        match client.send_command("Page.navigate", json!({"url": "about:blank"})).await {
            Err(CdpError::ConnectionClosed) => {}
            other => panic!("❌ Expected ConnectionClosed, but got: {:?}", other),
        }
        println!("✅ Writer failure left the connection terminally closed");
    }

    #[tokio::test]
    async fn test_malformed_frames_are_skipped() {
        let (client, mut peer) = test_connection();

        peer.push_text("not json at all");
        peer.push_json(json!({"neither": "id nor method"}));

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.send_command("Page.enable", json!({})).await }
        });
        let sent = peer.recv_json().await;
        peer.respond(sent["id"].as_u64().unwrap(), json!({"ok": true}));

        assert_eq!(call.await.unwrap().unwrap()["ok"], true);
        println!("✅ Malformed frames skipped, connection still alive");
    }

    #[tokio::test]
    async fn test_events_reach_subscribers_without_replay() {
        let (client, peer) = test_connection();
        let mut events = client.subscribe("Page.loadEventFired");

        peer.push_json(json!({"method": "Page.loadEventFired", "params": {"timestamp": 7.5}}));
        let delivered = timeout(Duration::from_secs(1), events.next())
            .await
            .expect("Timeout waiting for Page event")
            .expect("Stream closed unexpectedly");
        assert_eq!(delivered["timestamp"], 7.5);

        // A subscriber arriving now must not see the first event.
        let mut late = client.subscribe("Page.loadEventFired");
        peer.push_json(json!({"method": "Page.loadEventFired", "params": {"timestamp": 9.0}}));
        let delivered = timeout(Duration::from_secs(1), late.next())
            .await
            .expect("Timeout waiting for Page event")
            .expect("Stream closed unexpectedly");
        assert_eq!(delivered["timestamp"], 9.0, "❌ Late subscriber saw a replay");
        println!("✅ Events delivered live, no replay");
    }

    #[tokio::test]
    async fn test_event_without_params_arrives_as_empty_object() {
        let (client, peer) = test_connection();
        let mut events = client.subscribe("Inspector.detached");

        peer.push_json(json!({"method": "Inspector.detached"}));

        let delivered = timeout(Duration::from_secs(1), events.next())
            .await
            .expect("Timeout waiting for event")
            .expect("Stream closed unexpectedly");
        assert_eq!(delivered, json!({}));
    }

    #[tokio::test]
    async fn test_subscriptions_end_on_close() {
        let (client, peer) = test_connection();
        let mut live = client.subscribe("Page.loadEventFired");

        drop(peer.push);
        match client.send_command("Page.enable", json!({})).await {
            Err(CdpError::ConnectionClosed) => {}
            other => panic!("❌ Expected ConnectionClosed, but got: {:?}", other),
        }

        assert_eq!(timeout(Duration::from_secs(1), live.next()).await.unwrap(), None);

        let mut late = client.subscribe("Page.loadEventFired");
        assert_eq!(timeout(Duration::from_secs(1), late.next()).await.unwrap(), None);
        println!("✅ Event streams ended with the connection");
    }
}

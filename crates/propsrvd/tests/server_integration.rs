//! Integration tests for the property server.
//!
//! These tests verify the complete client-server flow over TCP:
//! - Greeting on connect
//! - Subscribe with replay, then live updates from the host
//! - Error replies for names that cannot be resolved
//! - Independent subscriptions of several clients
//! - Cleanup on disconnect and on server stop
//!
//! Tests may use `.unwrap()` and `.expect()`.

use std::sync::Arc;
use std::time::Duration;

use propsrv_core::{PropertySource, PropertyTable, PropertyValue, SourceObject};
use propsrvd::host::{host_registry, InputTrigger, LogInputTrigger, StatusData, TriggerError};
use propsrvd::server::{PropertyServer, ServerContext, SessionState};
use propsrvd::subscriptions::SubscriptionManager;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(150);
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

const RPMS: &str = "dcp.gd.Rpms";
const SPEED: &str = "dcp.gd.SpeedKmh";

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    server: Arc<PropertyServer>,
    subscriptions: Arc<SubscriptionManager>,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with_input(Arc::new(LogInputTrigger)).await
    }

    async fn spawn_with_input(input: Arc<dyn InputTrigger>) -> Self {
        let subscriptions = Arc::new(SubscriptionManager::new(Arc::new(host_registry())));
        let ctx = Arc::new(ServerContext::new(Arc::clone(&subscriptions), input, "SimHub"));
        let cancel_token = CancellationToken::new();

        let server = Arc::new(
            PropertyServer::bind(0, ctx, cancel_token.clone())
                .await
                .expect("Failed to bind server"),
        );

        let runner = Arc::clone(&server);
        let handle = tokio::spawn(async move {
            runner.run().await.expect("Server run failed");
        });

        Self {
            server,
            subscriptions,
            cancel_token,
            handle,
        }
    }

    /// Connects and consumes the greeting.
    async fn connect(&self) -> TestClient {
        let mut client = self.connect_raw().await;
        assert_eq!(client.recv().await, "SimHub Property Server");
        client
    }

    async fn connect_raw(&self) -> TestClient {
        let stream = TcpStream::connect(self.server.local_addr())
            .await
            .expect("Failed to connect");
        TestClient::new(stream)
    }

    async fn push_status(&self, status: &StatusData) {
        self.subscriptions
            .push_update(PropertySource::StatusData, Some(status as &SourceObject))
            .await;
    }

    async fn wait_for_session_count(&self, expected: usize) {
        timeout(READ_TIMEOUT, async {
            while self.server.session_count().await != expected {
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("session count never reached {expected}"));
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        let _ = timeout(SHUTDOWN_GRACE_PERIOD * 10, self.handle).await;
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one line without its terminator.
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for a line")
            .expect("Read failed");
        assert!(n > 0, "Connection closed while waiting for a line");
        assert!(line.ends_with("\r\n"), "Line not CRLF terminated: {line:?}");
        line.trim_end_matches("\r\n").to_string()
    }

    /// Asserts nothing arrives for a short while.
    async fn expect_silence(&mut self) {
        let mut line = String::new();
        if let Ok(result) = timeout(QUIET_PERIOD, self.reader.read_line(&mut line)).await {
            panic!("Expected silence, got {result:?}: {line:?}");
        }
    }

    /// Waits for the server to close the connection.
    async fn expect_eof(&mut self) {
        let mut line = String::new();
        loop {
            line.clear();
            let n = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
                .await
                .expect("Timed out waiting for EOF")
                .unwrap_or(0);
            if n == 0 {
                return;
            }
        }
    }

    /// Round-trips a `help` so every earlier command has been processed.
    async fn sync(&mut self) -> Vec<String> {
        self.send("help").await;
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await;
            let done = line == "  disconnect";
            lines.push(line);
            if done {
                return lines;
            }
        }
    }
}

fn status(rpms: i32) -> StatusData {
    StatusData {
        rpms,
        ..StatusData::default()
    }
}

fn speed(speed_kmh: f64) -> StatusData {
    StatusData {
        speed_kmh,
        ..StatusData::default()
    }
}

struct KnownInputs(&'static [&'static str]);

impl InputTrigger for KnownInputs {
    fn trigger_input(&self, input: &str) -> Result<(), TriggerError> {
        if self.0.iter().any(|known| *known == input) {
            Ok(())
        } else {
            Err(TriggerError::UnknownInput {
                input: input.to_string(),
            })
        }
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_greeting_on_connect() {
    let server = TestServer::spawn().await;
    let mut client = server.connect_raw().await;

    assert_eq!(client.recv().await, "SimHub Property Server");

    server.wait_for_session_count(1).await;
    let sessions = server.server.sessions().await;
    assert_eq!(sessions[0].id(), 1);
    assert_eq!(sessions[0].state(), SessionState::Active);

    server.shutdown().await;
}

#[tokio::test]
async fn test_connection_ids_are_sequential() {
    let server = TestServer::spawn().await;
    let _a = server.connect().await;
    let _b = server.connect().await;

    server.wait_for_session_count(2).await;
    let mut ids: Vec<u64> = server.server.sessions().await.iter().map(|s| s.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);

    server.shutdown().await;
}

// ============================================================================
// Subscribe Flow Tests
// ============================================================================

#[tokio::test]
async fn test_subscribe_replays_null_then_streams_updates() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send(&format!("subscribe {RPMS}")).await;
    assert_eq!(client.recv().await, "Property dcp.gd.Rpms integer (null)");

    server.push_status(&status(1500)).await;
    assert_eq!(client.recv().await, "Property dcp.gd.Rpms integer 1500");

    // Same value again is not a change
    server.push_status(&status(1500)).await;
    client.expect_silence().await;

    server.push_status(&status(1600)).await;
    assert_eq!(client.recv().await, "Property dcp.gd.Rpms integer 1600");

    server.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_replays_existing_value() {
    let server = TestServer::spawn().await;
    let mut first = server.connect().await;

    first.send(&format!("subscribe {RPMS}")).await;
    first.recv().await;
    server.push_status(&status(4200)).await;
    assert_eq!(first.recv().await, "Property dcp.gd.Rpms integer 4200");

    let mut second = server.connect().await;
    second.send(&format!("subscribe {RPMS}")).await;
    assert_eq!(second.recv().await, "Property dcp.gd.Rpms integer 4200");

    // The newcomer's replay does not reach the existing subscriber
    first.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_unknown_property_replies_error() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send("subscribe dcp.NoSuchThing").await;
    let reply = client.recv().await;
    assert!(reply.starts_with("ERR: "), "got {reply}");
    assert!(reply.contains("NoSuchThing"), "got {reply}");

    server.push_status(&status(1500)).await;
    client.expect_silence().await;
    assert!(server.subscriptions.is_empty().await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_unprefixed_unknown_name_is_a_host_property() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    // No source prefix, so the name goes to the host property table
    client.send("subscribe nosuch.prop").await;
    assert_eq!(client.recv().await, "Property nosuch.prop object (null)");

    // A known prefix resolves strictly
    client.send("subscribe dcp.gd.NoSuch").await;
    let reply = client.recv().await;
    assert!(reply.starts_with("ERR: "), "got {reply}");

    assert_eq!(server.subscriptions.len().await, 1);
    assert!(server.subscriptions.snapshot().await.contains_key("nosuch.prop"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_unsupported_member_replies_error() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send("subscribe dcp.gd.PlayerName").await;
    let reply = client.recv().await;
    assert!(reply.starts_with("ERR: "), "got {reply}");
    assert!(reply.contains("not supported"), "got {reply}");

    client.send("subscribe dcp.gd.GetSectorTime").await;
    let reply = client.recv().await;
    assert!(reply.contains("takes 1 parameters"), "got {reply}");

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_subscribe_is_ignored() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send(&format!("subscribe {RPMS}")).await;
    client.recv().await;
    client.send(&format!("subscribe {RPMS}")).await;
    client.sync().await;

    server.push_status(&status(900)).await;
    assert_eq!(client.recv().await, "Property dcp.gd.Rpms integer 900");
    client.expect_silence().await;

    let snapshot = server.subscriptions.snapshot().await;
    assert_eq!(snapshot[RPMS].subscriber_count(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_generic_property_reports_observed_type() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send("subscribe DataCorePlugin.CurrentGame").await;
    assert_eq!(
        client.recv().await,
        "Property DataCorePlugin.CurrentGame object (null)"
    );

    let mut table = PropertyTable::new();
    table.insert(
        "DataCorePlugin.CurrentGame",
        PropertyValue::Str("AssettoCorsaCompetizione".into()),
    );
    server
        .subscriptions
        .push_update(PropertySource::Generic, Some(&table as &SourceObject))
        .await;

    assert_eq!(
        client.recv().await,
        "Property DataCorePlugin.CurrentGame string AssettoCorsaCompetizione"
    );

    server.shutdown().await;
}

// ============================================================================
// Multi-Client Tests
// ============================================================================

#[tokio::test]
async fn test_two_clients_then_one_unsubscribes() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send(&format!("subscribe {SPEED}")).await;
    a.recv().await;
    b.send(&format!("subscribe {SPEED}")).await;
    b.recv().await;

    server.push_status(&speed(120.5)).await;
    assert_eq!(a.recv().await, "Property dcp.gd.SpeedKmh double 120.5");
    assert_eq!(b.recv().await, "Property dcp.gd.SpeedKmh double 120.5");

    a.send(&format!("unsubscribe {SPEED}")).await;
    a.sync().await;

    server.push_status(&speed(98.0)).await;
    assert_eq!(b.recv().await, "Property dcp.gd.SpeedKmh double 98");
    a.expect_silence().await;
    b.expect_silence().await;

    let snapshot = server.subscriptions.snapshot().await;
    assert_eq!(snapshot[SPEED].subscriber_count(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_last_unsubscribe_removes_property() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send(&format!("subscribe {RPMS}")).await;
    client.recv().await;
    assert_eq!(server.subscriptions.len().await, 1);

    client.send(&format!("unsubscribe {RPMS}")).await;
    client.sync().await;
    assert!(server.subscriptions.is_empty().await);

    // Unsubscribing again is silent
    client.send(&format!("unsubscribe {RPMS}")).await;
    let help = client.sync().await;
    assert_eq!(help[0], "Available properties:");

    server.shutdown().await;
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_disconnect_releases_all_subscriptions() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    for name in [RPMS, "dcp.gd.Gear", "dcp.GameRunning"] {
        client.send(&format!("subscribe {name}")).await;
        client.recv().await;
    }
    assert_eq!(server.subscriptions.len().await, 3);

    client.send("disconnect").await;
    client.expect_eof().await;

    assert!(server.subscriptions.is_empty().await);
    server.wait_for_session_count(0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_client_eof_releases_subscriptions() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send(&format!("subscribe {RPMS}")).await;
    client.recv().await;

    drop(client);
    server.wait_for_session_count(0).await;
    assert!(server.subscriptions.is_empty().await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_stop_disconnects_clients() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send(&format!("subscribe {RPMS}")).await;
    a.recv().await;
    server.wait_for_session_count(2).await;

    server.server.stop().await;

    a.expect_eof().await;
    b.expect_eof().await;
    assert!(server.subscriptions.is_empty().await);
    server.wait_for_session_count(0).await;

    // The listener is gone
    sleep(SHUTDOWN_GRACE_PERIOD).await;
    let addr = server.server.local_addr();
    let reconnect = TcpStream::connect(addr).await;
    assert!(reconnect.is_err(), "server still accepting after stop");

    server.shutdown().await;
}

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test]
async fn test_help_lists_properties_and_commands() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let lines = client.sync().await;
    assert_eq!(lines[0], "Available properties:");
    assert!(lines.contains(&"  dcp.gd.Rpms integer".to_string()));
    assert!(lines.contains(&"  dcp.gd.SpeedKmh double".to_string()));
    assert!(lines.contains(&"  dcp.GameRunning boolean".to_string()));
    assert!(!lines.iter().any(|l| l.contains("PlayerName")));
    assert!(!lines.iter().any(|l| l.starts_with("  sib.")));

    let commands_at = lines
        .iter()
        .position(|l| l == "Available commands:")
        .expect("commands header");
    assert_eq!(
        &lines[commands_at + 1..],
        &[
            "  subscribe propertyName",
            "  unsubscribe propertyName",
            "  trigger-input inputName",
            "  help",
            "  disconnect",
        ]
    );

    let names: Vec<&String> = lines[1..commands_at].iter().collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted, "properties are listed sorted by name");

    server.shutdown().await;
}

#[tokio::test]
async fn test_trigger_input() {
    let server = TestServer::spawn_with_input(Arc::new(KnownInputs(&["ResetTrip"]))).await;
    let mut client = server.connect().await;

    client.send("trigger-input ResetTrip").await;
    client.expect_silence().await;

    client.send("trigger-input Horn").await;
    assert_eq!(client.recv().await, "ERR: Input Horn is not known");

    server.shutdown().await;
}

#[tokio::test]
async fn test_commands_are_case_sensitive_and_whitespace_tolerant() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send("SUBSCRIBE dcp.gd.Rpms").await;
    assert_eq!(client.recv().await, "ERR: Received unknown command");

    client.send("  subscribe   dcp.gd.Rpms  ").await;
    assert_eq!(client.recv().await, "Property dcp.gd.Rpms integer (null)");

    server.shutdown().await;
}

//! One client connection.
//!
//! A session greets the client, then reads command lines until the client
//! disconnects, the connection fails, or the server stops it:
//!
//! ```text
//! Connected ──greeting──▶ Active ──disconnect / EOF / error / stop──▶ Closing ──▶ Closed
//! ```
//!
//! Malformed input never ends a session; it is answered with one `ERR:` line.
//!
//! The session is also the [`Subscriber`] for every property it subscribes
//! to, so value changes are written from the task running the update. Lines
//! are written whole and flushed one by one under the writer lock.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A panic while executing a command is caught and answered with `ERR:`
//! - Write failures are treated as an implicit disconnect

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use propsrv_protocol::{Command, ServerLine};

use crate::subscriptions::{NotifyError, SubscribeError, Subscriber, SubscriberId, ValueUpdate};

use super::ServerContext;

/// Maximum accepted line length (64 KB)
pub const MAX_LINE_LENGTH: usize = 65_536;

/// Write timeout (10 seconds)
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reply to a command that failed unexpectedly.
const INTERNAL_ERROR: &str = "Internal error while executing command";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connected,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Connected => 0,
            Self::Active => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent `disconnect`
    ClientRequest,
    /// Client closed its end
    EndOfStream,
    /// Reading or writing failed
    ConnectionError,
    /// The server is stopping
    ServerShutdown,
}

/// Errors of the session's own I/O.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Session is closed")]
    Closed,

    #[error("Failed to send current value of {property}: {source}")]
    Replay {
        property: String,
        #[source]
        source: NotifyError,
    },
}

impl From<SessionError> for NotifyError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Io(e) => NotifyError::Io(e.to_string()),
            SessionError::WriteTimeout => NotifyError::WriteTimeout,
            SessionError::Closed => NotifyError::Closed,
            SessionError::Replay { source, .. } => source,
        }
    }
}

/// State shared between the session task, notifying properties, and the server.
pub(crate) struct SessionShared {
    id: u64,
    ctx: Arc<ServerContext>,
    writer: Mutex<Option<BufWriter<OwnedWriteHalf>>>,
    subscribed: StdMutex<HashSet<String>>,
    state: AtomicU8,
    write_failed: AtomicBool,
    close_guard: Mutex<bool>,
    cancel_token: CancellationToken,
}

impl SessionShared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn is_closing(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    fn subscriber_id(&self) -> SubscriberId {
        SubscriberId::new(self.id)
    }

    fn subscribed_names(&self) -> Vec<String> {
        let set = self.subscribed.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = set.iter().cloned().collect();
        names.sort();
        names
    }

    async fn write_line(&self, line: &ServerLine) -> Result<(), SessionError> {
        self.write_lines(std::slice::from_ref(line)).await
    }

    /// Writes lines in order, each followed by CRLF and a flush.
    async fn write_lines(&self, lines: &[ServerLine]) -> Result<(), SessionError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(SessionError::Closed);
        };

        match timeout(WRITE_TIMEOUT, async {
            for line in lines {
                writer.write_all(line.to_wire().as_bytes()).await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }

    /// Unsubscribes everything and shuts the socket down. Runs once; later
    /// callers wait for the first one to finish.
    async fn close(&self, reason: CloseReason) {
        let mut closed = self.close_guard.lock().await;
        if *closed {
            return;
        }
        *closed = true;

        self.set_state(SessionState::Closing);
        self.cancel_token.cancel();

        let names = {
            let mut set = self.subscribed.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *set)
        };
        let manager = &self.ctx.subscriptions;
        for name in &names {
            if !manager.unsubscribe(name, self.subscriber_id()).await {
                debug!(property = %name, "Subscription was already gone");
            }
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Socket shutdown failed");
            }
        }

        self.set_state(SessionState::Closed);
        info!(
            client_id = self.id,
            reason = ?reason,
            unsubscribed = names.len(),
            "Client disconnected"
        );
    }
}

#[async_trait]
impl Subscriber for SessionShared {
    fn id(&self) -> SubscriberId {
        self.subscriber_id()
    }

    async fn notify(&self, update: &ValueUpdate) -> Result<(), NotifyError> {
        if self.is_closing() {
            return Err(NotifyError::Closed);
        }

        let result = self.write_line(&update.to_line()).await;
        if let Err(e) = &result {
            warn!(
                client_id = self.id,
                property = %update.name,
                error = %e,
                "Failed to send notification, disconnecting client"
            );
            self.write_failed.store(true, Ordering::Release);
            self.cancel_token.cancel();
        }
        result.map_err(NotifyError::from)
    }
}

/// Cloneable handle used by the server to observe and stop a session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Names this session is subscribed to, sorted.
    pub fn subscriptions(&self) -> Vec<String> {
        self.shared.subscribed_names()
    }

    /// Disconnects the session and waits for its cleanup.
    pub async fn disconnect(&self) {
        self.shared.close(CloseReason::ServerShutdown).await;
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

enum Flow {
    Continue,
    Disconnect,
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Eof,
}

/// Reads one line into `buf`, buffering at most `MAX_LINE_LENGTH + 1` bytes.
///
/// A longer line is skipped up to and including its newline without being
/// buffered, and reported as [`LineRead::TooLong`].
async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LENGTH as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.len() <= MAX_LINE_LENGTH {
        return Ok(LineRead::Line);
    }

    if buf.last() != Some(&b'\n') {
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    reader.consume(pos + 1);
                    break;
                }
                None => {
                    let len = available.len();
                    reader.consume(len);
                }
            }
        }
    }
    buf.clear();
    Ok(LineRead::TooLong)
}

/// The protocol state machine of one connection.
pub struct ClientSession {
    shared: Arc<SessionShared>,
    reader: BufReader<OwnedReadHalf>,
}

impl ClientSession {
    /// Creates a session. `cancel_token` should be a child of the server's token.
    pub fn new(
        id: u64,
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        ctx: Arc<ServerContext>,
        cancel_token: CancellationToken,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            id,
            ctx,
            writer: Mutex::new(Some(BufWriter::new(writer))),
            subscribed: StdMutex::new(HashSet::new()),
            state: AtomicU8::new(SessionState::Connected.as_u8()),
            write_failed: AtomicBool::new(false),
            close_guard: Mutex::new(false),
            cancel_token,
        });
        Self {
            shared,
            reader: BufReader::new(reader),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the session until it is closed.
    pub async fn run(mut self) {
        let span = info_span!("session", client_id = self.shared.id);
        async move {
            let reason = self.serve().await;
            self.shared.close(reason).await;
        }
        .instrument(span)
        .await
    }

    async fn serve(&mut self) -> CloseReason {
        let banner = ServerLine::banner(self.shared.ctx.product_name.as_str());
        if let Err(e) = self.shared.write_line(&banner).await {
            warn!(error = %e, "Failed to send greeting");
            return CloseReason::ConnectionError;
        }
        self.shared.set_state(SessionState::Active);
        debug!("Client session active");

        let cancel_token = self.shared.cancel_token.clone();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    return if self.shared.write_failed.load(Ordering::Acquire) {
                        CloseReason::ConnectionError
                    } else {
                        CloseReason::ServerShutdown
                    };
                }

                result = read_bounded_line(&mut self.reader, &mut buf) => result,
            };

            match read {
                Ok(LineRead::Eof) => {
                    debug!("Client sent EOF");
                    return CloseReason::EndOfStream;
                }
                Ok(LineRead::Line) => {}
                Ok(LineRead::TooLong) => {
                    let reply = ServerLine::error(format!(
                        "Line too long (max {MAX_LINE_LENGTH} bytes)"
                    ));
                    if self.reply(&reply).await.is_err() {
                        return CloseReason::ConnectionError;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read from client");
                    return CloseReason::ConnectionError;
                }
            }

            let line = String::from_utf8_lossy(&buf).into_owned();
            let flow = AssertUnwindSafe(self.handle_line(&line))
                .catch_unwind()
                .await;

            match flow {
                Ok(Ok(Flow::Continue)) => {}
                Ok(Ok(Flow::Disconnect)) => return CloseReason::ClientRequest,
                Ok(Err(e)) => {
                    warn!(error = %e, "Failed to write to client");
                    return CloseReason::ConnectionError;
                }
                Err(_) => {
                    error!(line = %line.trim_end(), "Command panicked");
                    if self.reply(&ServerLine::error(INTERNAL_ERROR)).await.is_err() {
                        return CloseReason::ConnectionError;
                    }
                }
            }
        }
    }

    async fn handle_line(&self, line: &str) -> Result<Flow, SessionError> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                debug!(line = %line.trim_end(), error = %e, "Invalid command");
                self.reply(&ServerLine::error(e.to_string())).await?;
                return Ok(Flow::Continue);
            }
        };

        debug!(command = command.name(), "Received command");

        match command {
            Command::Subscribe { property } => self.subscribe(property).await?,
            Command::Unsubscribe { property } => self.unsubscribe(&property).await,
            Command::Help => self.help().await?,
            Command::TriggerInput { input } => self.trigger_input(&input).await?,
            Command::Disconnect => {
                debug!("Client requested disconnect");
                return Ok(Flow::Disconnect);
            }
        }

        Ok(Flow::Continue)
    }

    async fn subscribe(&self, name: String) -> Result<(), SessionError> {
        let already = {
            let set = self.shared.subscribed.lock().unwrap_or_else(|e| e.into_inner());
            set.contains(&name)
        };
        if already {
            debug!(property = %name, "Already subscribed");
            return Ok(());
        }

        let subscriber: Arc<dyn Subscriber> = Arc::clone(&self.shared) as Arc<dyn Subscriber>;
        let manager = &self.shared.ctx.subscriptions;
        match manager.subscribe(&name, subscriber).await {
            Ok(()) => {
                {
                    let mut set = self.shared.subscribed.lock().unwrap_or_else(|e| e.into_inner());
                    set.insert(name.clone());
                }
                // Cleanup may have drained the set while we were subscribing.
                if self.shared.is_closing() {
                    manager.unsubscribe(&name, self.shared.subscriber_id()).await;
                }
                Ok(())
            }
            // A replay cut short may leave a partial line on the wire.
            Err(SubscribeError::Replay(source)) => {
                self.shared.write_failed.store(true, Ordering::Release);
                self.shared.cancel_token.cancel();
                Err(SessionError::Replay { property: name, source })
            }
            Err(e) => self.reply(&ServerLine::error(e.to_string())).await,
        }
    }

    async fn unsubscribe(&self, name: &str) {
        let owned = {
            let mut set = self.shared.subscribed.lock().unwrap_or_else(|e| e.into_inner());
            set.remove(name)
        };
        if !owned {
            debug!(property = %name, "Not subscribed, ignoring unsubscribe");
            return;
        }

        if !self
            .shared
            .ctx
            .subscriptions
            .unsubscribe(name, self.shared.subscriber_id())
            .await
        {
            warn!(property = %name, "Subscription was not registered");
        }
    }

    async fn help(&self) -> Result<(), SessionError> {
        let properties = self
            .shared
            .ctx
            .subscriptions
            .registry()
            .available_properties()
            .into_iter()
            .map(|d| (d.qualified_name().to_string(), d.value_type()));
        self.shared.write_lines(&ServerLine::help(properties)).await
    }

    async fn trigger_input(&self, input: &str) -> Result<(), SessionError> {
        match self.shared.ctx.input.trigger_input(input) {
            Ok(()) => {
                debug!(input = %input, "Triggered input");
                Ok(())
            }
            Err(e) => {
                info!(input = %input, error = %e, "Input trigger failed");
                self.reply(&ServerLine::error(e.to_string())).await
            }
        }
    }

    async fn reply(&self, line: &ServerLine) -> Result<(), SessionError> {
        self.shared.write_line(line).await
    }
}

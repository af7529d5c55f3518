//! Network infrastructure for the relay client.
//!
//! Owns the persistent connection to the presentation server and
//! reconnects it whenever it drops.
//!
//! Architecture:
//! - One worker task per [`RelayConnection`] owns the transport, the
//!   [`ConnectionState`], the reconnect timer, the keepalive ticker and the
//!   read idle deadline.  Nothing else touches them, so every state
//!   transition happens in one place and in order.
//! - Callers talk to the worker through an unbounded command channel
//!   (`connect`, `send`, `close`, `set_reconnect_enabled`) and read the state
//!   from a `watch` channel, so none of the handle methods ever block.
//! - The worker reports [`ConnectionEvent`]s on a bounded channel.
//! - The socket itself sits behind the [`Connector`] / [`Transport`] traits;
//!   [`websocket`] provides the real implementation and the tests use fakes.
//!
//! # Worker phases (for beginners)
//!
//! ```text
//!   Idle ──connect──> Attempt ──ok──> Connected
//!    ^                  │                │
//!    │               failure          close/error/idle
//!    │                  v                v
//!    └──policy off── Backoff <───────────┘
//!                       │
//!                  interval elapsed
//!                       └──> Attempt
//! ```
//!
//! `close()` from any phase goes back to `Idle` and cancels whatever timer
//! was pending.  The worker exits once every [`RelayConnection`] handle has
//! been dropped.

pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    decode_server_message, encode_command, Command, ConnectionState, Endpoint, ReconnectPolicy,
    RelayError,
};
use thiserror::Error;
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// How long `close()` waits for the peer to acknowledge the close handshake.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Capacity of the event channel returned by [`RelayConnection::spawn`].
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors raised by a [`Connector`] or [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("connection closed")]
    Closed,
}

/// One inbound frame, reduced to what the worker cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Ping/pong and other control traffic.  Only refreshes the idle deadline.
    Control,
    /// The peer started the close handshake, with its reason if it gave one.
    Close(Option<String>),
}

/// An established, bidirectional message connection.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn send_ping(&mut self) -> Result<(), TransportError>;

    /// The next inbound frame; `None` once the stream has ended.
    ///
    /// Must be cancel-safe: the worker drops this future whenever another
    /// event wins the race.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports to an [`Endpoint`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, TransportError>;
}

/// Timing configuration for a [`RelayConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub reconnect: ReconnectPolicy,
    /// An attempt that has not completed after this long counts as failed.
    pub connect_timeout: Duration,
    /// A connection with no inbound traffic for this long counts as lost.
    pub read_idle_timeout: Duration,
    /// Interval between WebSocket pings while connected.
    pub keepalive_interval: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            read_idle_timeout: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(20),
        }
    }
}

/// Events emitted by the connection worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The transport is up.
    Connected,
    /// The connection ended cleanly; `requested` is `true` when `close()` caused it.
    Closed { requested: bool },
    /// A connect attempt failed or an established connection broke.
    Error(RelayError),
    /// A text frame from the server.
    Message(String),
    /// A reconnect attempt will start after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
}

#[derive(Debug)]
enum WorkerCommand {
    Connect,
    Send(Command),
    Close,
    SetReconnect(bool),
}

/// Handle to a connection worker.
///
/// Cheap to clone; all clones drive the same worker.
#[derive(Clone)]
pub struct RelayConnection {
    endpoint: Endpoint,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl RelayConnection {
    /// Spawns the worker on `handle` in the `Disconnected` state.
    ///
    /// Nothing is dialled until [`RelayConnection::connect`] is called.
    pub fn spawn(
        endpoint: Endpoint,
        options: ConnectionOptions,
        connector: Arc<dyn Connector>,
        handle: &Handle,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let span = info_span!("relay_connection", endpoint = %endpoint);
        let worker = Worker {
            endpoint: endpoint.clone(),
            options,
            connector,
            commands: cmd_rx,
            events: event_tx,
            state: state_tx,
            attempt: 0,
        };
        handle.spawn(worker.run().instrument(span));

        let connection = Self {
            endpoint,
            commands: cmd_tx,
            state: state_rx,
        };
        (connection, event_rx)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Starts a connection attempt.
    ///
    /// Returns the current state unchanged when already `Connecting` or
    /// `Connected`.  From any other state the attempt is queued (cancelling a
    /// pending reconnect timer) and `Connecting` is returned.
    pub fn connect(&self) -> ConnectionState {
        let current = self.state();
        match current {
            ConnectionState::Connecting | ConnectionState::Connected => current,
            ConnectionState::Disconnected | ConnectionState::Closing => {
                let _ = self.commands.send(WorkerCommand::Connect);
                ConnectionState::Connecting
            }
        }
    }

    /// Queues `command` for the server.
    ///
    /// # Errors
    ///
    /// [`RelayError::NotConnected`] when the connection is not `Connected`.
    /// The command is not queued in that case.  A command queued just before
    /// the link drops is discarded by the worker, which then reconnects.
    pub fn send(&self, command: Command) -> Result<(), RelayError> {
        if !self.state().is_connected() {
            return Err(RelayError::NotConnected);
        }
        self.commands
            .send(WorkerCommand::Send(command))
            .map_err(|_| RelayError::NotConnected)
    }

    /// Closes the connection and cancels any pending reconnect.  Idempotent.
    pub fn close(&self) {
        let _ = self.commands.send(WorkerCommand::Close);
    }

    /// Turns automatic reconnection on or off.  Turning it off also cancels a
    /// pending reconnect timer.
    pub fn set_reconnect_enabled(&self, enabled: bool) {
        let _ = self.commands.send(WorkerCommand::SetReconnect(enabled));
    }
}

/// What the worker does next.
enum Phase {
    Idle,
    Attempt,
    Connected(Box<dyn Transport>),
    Backoff(Instant),
}

/// What woke the worker up while connected.
enum Wake {
    Frame(Option<Result<Frame, TransportError>>),
    Command(Option<WorkerCommand>),
    Keepalive,
    IdleTimeout,
}

struct Worker {
    endpoint: Endpoint,
    options: ConnectionOptions,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: mpsc::Sender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
    /// Consecutive failed attempts since the last successful connection.
    attempt: u32,
}

impl Worker {
    async fn run(mut self) {
        debug!("connection worker started");
        let mut phase = Phase::Idle;
        loop {
            let next = match phase {
                Phase::Idle => self.idle().await,
                Phase::Attempt => self.attempt().await,
                Phase::Connected(transport) => self.connected(transport).await,
                Phase::Backoff(deadline) => self.backoff(deadline).await,
            };
            match next {
                Some(p) => phase = p,
                None => break,
            }
        }
        self.set_state(ConnectionState::Disconnected);
        debug!("connection worker stopped");
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }

    async fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).await.is_err() {
            trace!("connection event dropped; no listener");
        }
    }

    /// Applies commands that mean the same thing in every unconnected phase.
    fn apply_passive(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::Send(cmd) => warn!(command = %cmd, "not connected; command dropped"),
            WorkerCommand::SetReconnect(enabled) => {
                self.options.reconnect.set_enabled(enabled);
                info!(enabled, "automatic reconnect toggled");
            }
            WorkerCommand::Connect | WorkerCommand::Close => {}
        }
    }

    async fn idle(&mut self) -> Option<Phase> {
        loop {
            match self.commands.recv().await? {
                WorkerCommand::Connect => return Some(Phase::Attempt),
                command @ WorkerCommand::Send(_) => {
                    // Queued while still connected; the link dropped since.
                    self.apply_passive(command);
                    return Some(Phase::Attempt);
                }
                other => self.apply_passive(other),
            }
        }
    }

    async fn attempt(&mut self) -> Option<Phase> {
        self.set_state(ConnectionState::Connecting);
        info!(url = %self.endpoint.ws_url(), "connecting");

        let timeout = self.options.connect_timeout;
        let connector = Arc::clone(&self.connector);
        let endpoint = self.endpoint.clone();
        let connect = time::timeout(timeout, async move { connector.connect(&endpoint).await });
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    let reason = match result {
                        Ok(Ok(transport)) => return Some(self.on_connected(transport).await),
                        Ok(Err(e)) => e.to_string(),
                        Err(_) => TransportError::Timeout(timeout).to_string(),
                    };
                    let error = RelayError::ConnectFailure {
                        endpoint: self.endpoint.to_string(),
                        reason,
                    };
                    return Some(self.on_lost(ConnectionEvent::Error(error)).await);
                }
                command = self.commands.recv() => match command? {
                    WorkerCommand::Close => {
                        info!("connection attempt cancelled");
                        self.set_state(ConnectionState::Closing);
                        self.set_state(ConnectionState::Disconnected);
                        self.emit(ConnectionEvent::Closed { requested: true }).await;
                        return Some(Phase::Idle);
                    }
                    other => self.apply_passive(other),
                },
            }
        }
    }

    async fn on_connected(&mut self, transport: Box<dyn Transport>) -> Phase {
        info!(after_retries = self.attempt, "connected");
        self.attempt = 0;
        self.set_state(ConnectionState::Connected);
        self.emit(ConnectionEvent::Connected).await;
        Phase::Connected(transport)
    }

    /// Records a lost or failed connection and decides whether to retry.
    async fn on_lost(&mut self, event: ConnectionEvent) -> Phase {
        match &event {
            ConnectionEvent::Error(e) => warn!("{e}"),
            other => info!(?other, "connection ended"),
        }
        self.set_state(ConnectionState::Disconnected);
        self.emit(event).await;

        if !self.options.reconnect.enabled() {
            debug!("automatic reconnect disabled; staying disconnected");
            return Phase::Idle;
        }
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.options.reconnect.interval();
        info!(attempt = self.attempt, ?delay, "reconnect scheduled");
        self.emit(ConnectionEvent::RetryScheduled {
            attempt: self.attempt,
            delay,
        })
        .await;
        Phase::Backoff(Instant::now() + delay)
    }

    async fn backoff(&mut self, deadline: Instant) -> Option<Phase> {
        let timer = time::sleep_until(deadline);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => return Some(Phase::Attempt),
                command = self.commands.recv() => match command? {
                    WorkerCommand::Connect => return Some(Phase::Attempt),
                    command @ WorkerCommand::Send(_) => {
                        self.apply_passive(command);
                        return Some(Phase::Attempt);
                    }
                    WorkerCommand::Close => {
                        info!("pending reconnect cancelled");
                        return Some(Phase::Idle);
                    }
                    WorkerCommand::SetReconnect(false) => {
                        self.apply_passive(WorkerCommand::SetReconnect(false));
                        return Some(Phase::Idle);
                    }
                    other => self.apply_passive(other),
                },
            }
        }
    }

    async fn connected(&mut self, mut transport: Box<dyn Transport>) -> Option<Phase> {
        let idle_timeout = self.options.read_idle_timeout;
        let every = self.options.keepalive_interval;
        let mut keepalive = time::interval_at(Instant::now() + every, every);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_inbound = Instant::now();

        loop {
            let wake = tokio::select! {
                frame = transport.next_frame() => Wake::Frame(frame),
                command = self.commands.recv() => Wake::Command(command),
                _ = keepalive.tick() => Wake::Keepalive,
                () = time::sleep_until(last_inbound + idle_timeout) => Wake::IdleTimeout,
            };

            match wake {
                Wake::Frame(Some(Ok(frame))) => {
                    last_inbound = Instant::now();
                    match frame {
                        Frame::Text(text) => self.on_text(text).await,
                        Frame::Binary(bytes) => {
                            debug!(len = bytes.len(), "ignoring binary frame")
                        }
                        Frame::Control => trace!("control frame"),
                        Frame::Close(reason) => {
                            info!(?reason, "server closed the connection");
                            let _ = time::timeout(CLOSE_GRACE, transport.close()).await;
                            return Some(
                                self.on_lost(ConnectionEvent::Closed { requested: false })
                                    .await,
                            );
                        }
                    }
                }
                Wake::Frame(Some(Err(e))) => {
                    return Some(self.on_lost(unexpected_close(e.to_string())).await);
                }
                Wake::Frame(None) => {
                    return Some(self.on_lost(unexpected_close("stream ended")).await);
                }
                Wake::Command(None) => {
                    self.shutdown(transport).await;
                    return None;
                }
                Wake::Command(Some(WorkerCommand::Send(command))) => {
                    let text = match encode_command(&command) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(command = %command, "could not encode command: {e}");
                            continue;
                        }
                    };
                    debug!(frame = %text, "sending");
                    if let Err(e) = transport.send_text(text).await {
                        return Some(self.on_lost(unexpected_close(e.to_string())).await);
                    }
                }
                Wake::Command(Some(WorkerCommand::Close)) => {
                    self.shutdown(transport).await;
                    self.emit(ConnectionEvent::Closed { requested: true }).await;
                    return Some(Phase::Idle);
                }
                Wake::Command(Some(other)) => self.apply_passive(other),
                Wake::Keepalive => {
                    trace!("keepalive ping");
                    if let Err(e) = transport.send_ping().await {
                        return Some(self.on_lost(unexpected_close(e.to_string())).await);
                    }
                }
                Wake::IdleTimeout => {
                    let reason = format!("no data received for {idle_timeout:?}");
                    return Some(self.on_lost(unexpected_close(reason)).await);
                }
            }
        }
    }

    async fn on_text(&mut self, text: String) {
        match decode_server_message(&text) {
            Ok(message) => match message.status.as_deref() {
                Some(status) => info!(status, "server replied"),
                None => debug!(frame = %text, "server frame without status"),
            },
            Err(e) => debug!(frame = %text, "undecodable server frame: {e}"),
        }
        self.emit(ConnectionEvent::Message(text)).await;
    }

    async fn shutdown(&mut self, mut transport: Box<dyn Transport>) {
        self.set_state(ConnectionState::Closing);
        match time::timeout(CLOSE_GRACE, transport.close()).await {
            Ok(Ok(())) => debug!("close handshake complete"),
            Ok(Err(e)) => debug!("close handshake failed: {e}"),
            Err(_) => debug!("close handshake timed out"),
        }
        self.set_state(ConnectionState::Disconnected);
        info!("connection closed");
    }
}

fn unexpected_close(reason: impl Into<String>) -> ConnectionEvent {
    ConnectionEvent::Error(RelayError::UnexpectedClose {
        reason: reason.into(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// What a [`FakeTransport`] was asked to write.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Sent {
        Text(String),
        Ping,
        Close,
    }

    /// In-memory transport: inbound frames are pushed by the test, outbound
    /// writes are recorded on a channel.
    pub(crate) struct FakeTransport {
        inbound: mpsc::UnboundedReceiver<Frame>,
        outbound: mpsc::UnboundedSender<Sent>,
    }

    /// The test's side of a [`FakeTransport`].
    pub(crate) struct FakePeer {
        pub inbound: mpsc::UnboundedSender<Frame>,
        pub outbound: mpsc::UnboundedReceiver<Sent>,
    }

    pub(crate) fn fake_pair() -> (FakeTransport, FakePeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            FakeTransport {
                inbound: in_rx,
                outbound: out_tx,
            },
            FakePeer {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.outbound
                .send(Sent::Text(text))
                .map_err(|_| TransportError::Closed)
        }

        async fn send_ping(&mut self) -> Result<(), TransportError> {
            self.outbound.send(Sent::Ping).map_err(|_| TransportError::Closed)
        }

        async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
            self.inbound.recv().await.map(Ok)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            let _ = self.outbound.send(Sent::Close);
            Ok(())
        }
    }

    /// A connector whose attempts never complete.
    pub(crate) struct PendingConnector {
        pub calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for PendingConnector {
        async fn connect(&self, _: &Endpoint) -> Result<Box<dyn Transport>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("192.168.0.10", 10696).unwrap()
    }

    fn options(interval_ms: u64) -> ConnectionOptions {
        ConnectionOptions {
            reconnect: ReconnectPolicy::new(true, Duration::from_millis(interval_ms)).unwrap(),
            ..ConnectionOptions::default()
        }
    }

    /// A mock connector that hands out the given transports in order, then
    /// refuses every further attempt.
    pub(crate) fn connector_with(transports: Vec<FakeTransport>) -> MockConnector {
        let mut remaining = transports.into_iter();
        let mut mock = MockConnector::new();
        mock.expect_connect().returning(move |_| {
            remaining
                .next()
                .map(|t| Box::new(t) as Box<dyn Transport>)
                .ok_or_else(|| TransportError::Connect("refused".into()))
        });
        mock
    }

    async fn wait_for_state(conn: &RelayConnection, wanted: ConnectionState) {
        let mut rx = conn.subscribe_state();
        rx.wait_for(|s| *s == wanted).await.unwrap();
    }

    #[test]
    fn test_connection_options_default_timeouts() {
        // Arrange / Act
        let opts = ConnectionOptions::default();

        // Assert
        assert_eq!(opts.connect_timeout, Duration::from_secs(10));
        assert_eq!(opts.read_idle_timeout, Duration::from_secs(60));
        assert_eq!(opts.keepalive_interval, Duration::from_secs(20));
        assert_eq!(opts.reconnect, ReconnectPolicy::default());
    }

    #[tokio::test]
    async fn test_spawn_starts_disconnected_and_does_not_dial() {
        // Arrange
        let mut mock = MockConnector::new();
        mock.expect_connect().never();

        // Act
        let (conn, _events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(mock), &Handle::current());
        tokio::task::yield_now().await;

        // Assert
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_returns_not_connected() {
        // Arrange
        let (conn, _events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(MockConnector::new()),
            &Handle::current(),
        );

        // Act
        let result = conn.send(Command::next_slide());

        // Assert
        assert_eq!(result, Err(RelayError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_retry_at_fixed_interval() {
        // Arrange – every attempt is refused; record when each one happens
        let attempts: Arc<Mutex<Vec<Instant>>> = Arc::default();
        let seen = Arc::clone(&attempts);
        let mut mock = MockConnector::new();
        mock.expect_connect().returning(move |_| {
            seen.lock().unwrap().push(Instant::now());
            Err(TransportError::Connect("connection refused".into()))
        });
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(mock), &Handle::current());

        // Act
        conn.connect();
        let mut retries = Vec::new();
        let mut errors = 0;
        while retries.len() < 5 {
            match events.recv().await.unwrap() {
                ConnectionEvent::RetryScheduled { attempt, delay } => retries.push((attempt, delay)),
                ConnectionEvent::Error(e) => {
                    assert!(e.is_transport_failure());
                    errors += 1;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        // Assert – five failures, five retries, each exactly one interval apart
        assert_eq!(errors, 5);
        let numbers: Vec<u32> = retries.iter().map(|r| r.0).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(retries.iter().all(|r| r.1 == Duration::from_millis(5000)));

        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 5);
        for pair in attempts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_millis(5000));
        }
        assert_ne!(conn.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_while_connecting() {
        // Arrange
        let calls = Arc::new(AtomicUsize::new(0));
        let connector = PendingConnector {
            calls: Arc::clone(&calls),
        };
        let (conn, _events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(connector), &Handle::current());

        // Act
        conn.connect();
        wait_for_state(&conn, ConnectionState::Connecting).await;
        let second = conn.connect();
        time::sleep(Duration::from_millis(10)).await;

        // Assert
        assert_eq!(second, ConnectionState::Connecting);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_feeds_reconnect_path() {
        // Arrange
        let calls = Arc::new(AtomicUsize::new(0));
        let connector = PendingConnector {
            calls: Arc::clone(&calls),
        };
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(connector), &Handle::current());
        let start = Instant::now();

        // Act
        conn.connect();
        let first = events.recv().await.unwrap();

        // Assert – failure reported after exactly the 10 s connect timeout
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        match first {
            ConnectionEvent::Error(RelayError::ConnectFailure { reason, .. }) => {
                assert!(reason.contains("timed out"), "reason: {reason}")
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            ConnectionEvent::RetryScheduled { attempt: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_connecting_cancels_attempt_and_timers() {
        // Arrange
        let calls = Arc::new(AtomicUsize::new(0));
        let connector = PendingConnector {
            calls: Arc::clone(&calls),
        };
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(connector), &Handle::current());
        conn.connect();
        wait_for_state(&conn, ConnectionState::Connecting).await;

        // Act
        conn.close();
        let event = events.recv().await.unwrap();
        time::sleep(Duration::from_secs(60)).await;

        // Assert – no timeout error, no retry, no second attempt
        assert_eq!(event, ConnectionEvent::Closed { requested: true });
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(events.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent_from_disconnected() {
        // Arrange
        let mut mock = MockConnector::new();
        mock.expect_connect().never();
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(mock), &Handle::current());

        // Act
        conn.close();
        conn.close();
        time::sleep(Duration::from_secs(1)).await;

        // Assert
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_send_writes_one_text_frame() {
        // Arrange
        let (transport, mut peer) = fake_pair();
        let (conn, mut events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(connector_with(vec![transport])),
            &Handle::current(),
        );
        conn.connect();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

        // Act
        conn.send(Command::prev_slide()).unwrap();
        let sent = peer.outbound.recv().await.unwrap();

        // Assert
        assert_eq!(sent, Sent::Text(r#"{"command":"PREV_SLIDE"}"#.to_string()));
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_status_reply_is_surfaced_as_message() {
        // Arrange
        let (transport, peer) = fake_pair();
        let (conn, mut events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(connector_with(vec![transport])),
            &Handle::current(),
        );
        conn.connect();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

        // Act
        let reply = r#"{"status":"Slide avançado"}"#.to_string();
        peer.inbound.send(Frame::Text(reply.clone())).unwrap();

        // Assert
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Message(reply));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_reports_closed_then_reconnects_after_interval() {
        // Arrange – two transports: the first is closed by the server
        let (first, first_peer) = fake_pair();
        let (second, _second_peer) = fake_pair();
        let (conn, mut events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(connector_with(vec![first, second])),
            &Handle::current(),
        );
        conn.connect();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

        // Act
        first_peer
            .inbound
            .send(Frame::Close(Some("bye".into())))
            .unwrap();
        let closed = events.recv().await.unwrap();
        let retry = events.recv().await.unwrap();
        let closed_at = Instant::now();
        let reconnected = events.recv().await.unwrap();

        // Assert
        assert_eq!(closed, ConnectionEvent::Closed { requested: false });
        assert_eq!(
            retry,
            ConnectionEvent::RetryScheduled {
                attempt: 1,
                delay: Duration::from_millis(5000)
            }
        );
        assert_eq!(reconnected, ConnectionEvent::Connected);
        assert_eq!(closed_at.elapsed(), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_stream_is_unexpected_close() {
        // Arrange
        let (transport, peer) = fake_pair();
        let (conn, mut events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(connector_with(vec![transport])),
            &Handle::current(),
        );
        conn.connect();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

        // Act – the peer vanishes without a close frame
        drop(peer);
        let event = events.recv().await.unwrap();

        // Assert
        assert!(matches!(
            event,
            ConnectionEvent::Error(RelayError::UnexpectedClose { .. })
        ));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_pings_then_idle_timeout_drops_connection() {
        // Arrange – the peer never answers
        let (transport, mut peer) = fake_pair();
        let (conn, mut events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(connector_with(vec![transport])),
            &Handle::current(),
        );
        conn.connect();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
        let connected_at = Instant::now();

        // Act
        let first_ping = peer.outbound.recv().await.unwrap();
        let ping_at = connected_at.elapsed();
        let event = events.recv().await.unwrap();

        // Assert
        assert_eq!(first_ping, Sent::Ping);
        assert_eq!(ping_at, Duration::from_secs(20));
        match event {
            ConnectionEvent::Error(RelayError::UnexpectedClose { reason }) => {
                assert!(reason.contains("no data received"), "reason: {reason}")
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(connected_at.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_traffic_refreshes_idle_deadline() {
        // Arrange
        let (transport, peer) = fake_pair();
        let (conn, mut events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(connector_with(vec![transport])),
            &Handle::current(),
        );
        conn.connect();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

        // Act – a pong every 30 s keeps the connection alive past 60 s
        for _ in 0..4 {
            time::sleep(Duration::from_secs(30)).await;
            peer.inbound.send(Frame::Control).unwrap();
        }
        tokio::task::yield_now().await;

        // Assert
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requested_close_sends_close_and_stays_down() {
        // Arrange
        let (transport, mut peer) = fake_pair();
        let (conn, mut events) = RelayConnection::spawn(
            endpoint(),
            options(5000),
            Arc::new(connector_with(vec![transport])),
            &Handle::current(),
        );
        conn.connect();
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

        // Act
        conn.close();
        let event = events.recv().await.unwrap();
        time::sleep(Duration::from_secs(30)).await;

        // Assert
        assert_eq!(event, ConnectionEvent::Closed { requested: true });
        assert_eq!(peer.outbound.recv().await.unwrap(), Sent::Close);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_reconnect_cancels_pending_retry() {
        // Arrange
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut mock = MockConnector::new();
        mock.expect_connect().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Connect("refused".into()))
        });
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(mock), &Handle::current());
        conn.connect();
        assert!(matches!(events.recv().await.unwrap(), ConnectionEvent::Error(_)));
        assert!(matches!(
            events.recv().await.unwrap(),
            ConnectionEvent::RetryScheduled { .. }
        ));

        // Act
        conn.set_reconnect_enabled(false);
        time::sleep(Duration::from_secs(30)).await;

        // Assert – the scheduled retry never ran
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_connect_during_backoff_retries_immediately() {
        // Arrange
        let attempts: Arc<Mutex<Vec<Instant>>> = Arc::default();
        let seen = Arc::clone(&attempts);
        let mut mock = MockConnector::new();
        mock.expect_connect().returning(move |_| {
            seen.lock().unwrap().push(Instant::now());
            Err(TransportError::Connect("refused".into()))
        });
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(mock), &Handle::current());
        conn.connect();
        events.recv().await.unwrap();
        events.recv().await.unwrap();

        // Act
        time::sleep(Duration::from_millis(1000)).await;
        conn.connect();
        events.recv().await.unwrap();

        // Assert – second attempt at t=1s rather than t=5s
        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1] - attempts[0], Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_that_raced_a_drop_retries_immediately() {
        // Arrange – first attempt refused, worker now backing off for 5 s
        let attempts: Arc<Mutex<Vec<Instant>>> = Arc::default();
        let seen = Arc::clone(&attempts);
        let mut mock = MockConnector::new();
        mock.expect_connect().returning(move |_| {
            seen.lock().unwrap().push(Instant::now());
            Err(TransportError::Connect("refused".into()))
        });
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), options(5000), Arc::new(mock), &Handle::current());
        conn.connect();
        events.recv().await.unwrap();
        events.recv().await.unwrap();

        // Act – a send accepted while the state still read Connected
        time::sleep(Duration::from_millis(500)).await;
        conn.commands
            .send(WorkerCommand::Send(Command::next_slide()))
            .unwrap();
        events.recv().await.unwrap();

        // Assert – the command was dropped and a new attempt ran at t=0.5s
        let attempts = attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1] - attempts[0], Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_that_raced_a_drop_reconnects_from_idle() {
        // Arrange – reconnect disabled, so the refused attempt leaves the worker idle
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut mock = MockConnector::new();
        mock.expect_connect().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Connect("refused".into()))
        });
        let opts = ConnectionOptions {
            reconnect: ReconnectPolicy::disabled(),
            ..ConnectionOptions::default()
        };
        let (conn, mut events) =
            RelayConnection::spawn(endpoint(), opts, Arc::new(mock), &Handle::current());
        conn.connect();
        events.recv().await.unwrap();

        // Act
        conn.commands
            .send(WorkerCommand::Send(Command::prev_slide()))
            .unwrap();
        events.recv().await.unwrap();

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

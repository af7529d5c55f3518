//! RelayService: the lifecycle façade the host application talks to.
//!
//! One `start` creates a fresh [`RelayConnection`], begins connecting,
//! subscribes the [`DirectionDetector`] and spawns two small tasks:
//!
//! - the **pump** maps each [`DirectionEvent`] to a [`relay_core::Command`] and hands it
//!   to the connection.  When the connection is down the command is dropped
//!   and a reconnect is triggered instead.
//! - the **forwarder** turns [`ConnectionEvent`]s into [`StatusEvent`]s for
//!   the host's [`StatusSink`].
//!
//! `stop` tears all of it down again.  Neither call waits for the network.

use std::sync::{Arc, Mutex, MutexGuard};

use relay_core::{
    map_direction, map_explicit, ConnectionState, DirectionEvent, Endpoint, RelayError,
    StatusEvent,
};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::detect_direction::{DetectorSubscription, DirectionDetector};
use crate::infrastructure::network::{
    ConnectionEvent, ConnectionOptions, Connector, RelayConnection,
};

/// Failure to deliver a status event to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("status listener is gone")]
    Disconnected,
    #[error("status delivery failed: {0}")]
    Failed(String),
}

/// Receives connection status changes.
///
/// Called from a background task.  Implementations must not block; a
/// returned error is logged and otherwise ignored.
#[cfg_attr(test, mockall::automock)]
pub trait StatusSink: Send + Sync {
    fn notify(&self, event: &StatusEvent) -> Result<(), SinkError>;
}

/// Everything that exists only between `start` and `stop`.
struct RunningRelay {
    relay_id: Uuid,
    connection: RelayConnection,
    subscription: DetectorSubscription,
    pump: JoinHandle<()>,
}

pub struct RelayService {
    connector: Arc<dyn Connector>,
    detector: DirectionDetector,
    sink: Arc<dyn StatusSink>,
    options: ConnectionOptions,
    handle: Handle,
    running: Mutex<Option<RunningRelay>>,
}

impl RelayService {
    /// Creates a stopped service.  Background tasks are spawned on `handle`,
    /// so `start`/`stop` may be called from threads outside the runtime.
    pub fn new(
        connector: Arc<dyn Connector>,
        detector: DirectionDetector,
        sink: Arc<dyn StatusSink>,
        options: ConnectionOptions,
        handle: Handle,
    ) -> Self {
        Self {
            connector,
            detector,
            sink,
            options,
            handle,
            running: Mutex::new(None),
        }
    }

    /// Validates `host`/`port` and starts relaying.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidEndpoint`] for an unusable host or port.
    /// - [`RelayError::InputUnavailable`] when the volume source refuses the
    ///   subscription.
    ///
    /// The service stays stopped in both cases.
    pub fn start(&self, host: &str, port: u16) -> Result<(), RelayError> {
        let endpoint = Endpoint::new(host, port)?;
        self.start_endpoint(endpoint)
    }

    /// Starts relaying to `endpoint`.  Succeeds without doing anything when
    /// already running.
    pub fn start_endpoint(&self, endpoint: Endpoint) -> Result<(), RelayError> {
        let mut running = self.lock();
        if let Some(relay) = running.as_ref() {
            debug!(relay_id = %relay.relay_id, "start ignored; relay already running");
            return Ok(());
        }

        let relay_id = Uuid::new_v4();
        let span = info_span!("relay", %relay_id);
        let _enter = span.enter();

        let (subscription, directions) = match self.detector.subscribe(&self.handle) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("volume input unavailable, relay not started: {e}");
                return Err(RelayError::InputUnavailable(e.to_string()));
            }
        };

        let (connection, events) = RelayConnection::spawn(
            endpoint.clone(),
            self.options.clone(),
            Arc::clone(&self.connector),
            &self.handle,
        );
        self.handle
            .spawn(forward_status(events, Arc::clone(&self.sink)).instrument(span.clone()));
        connection.connect();

        let pump = self.handle.spawn(
            pump_directions(directions, connection.clone()).instrument(span.clone()),
        );

        info!(%endpoint, strategy = %self.detector.options().strategy, "relay started");
        *running = Some(RunningRelay {
            relay_id,
            connection,
            subscription,
            pump,
        });
        Ok(())
    }

    /// Unsubscribes the detector and closes the connection.  Idempotent.
    pub fn stop(&self) {
        let Some(mut relay) = self.lock().take() else {
            debug!("stop ignored; relay not running");
            return;
        };

        relay.subscription.unsubscribe();
        relay.pump.abort();
        relay.connection.close();
        info!(relay_id = %relay.relay_id, "relay stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Sends a named command, bypassing the detector.
    ///
    /// `next` and `prev` are accepted as aliases for the slide commands.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidCommand`] for a blank name.
    /// - [`RelayError::NotConnected`] when stopped or not connected.  If the
    ///   relay is running a reconnect is triggered and the command dropped.
    pub fn send_explicit_command(&self, name: &str) -> Result<(), RelayError> {
        let command = map_explicit(name)?;
        let running = self.lock();
        let Some(relay) = running.as_ref() else {
            return Err(RelayError::NotConnected);
        };

        let label = command.to_string();
        match relay.connection.send(command) {
            Ok(()) => {
                debug!(command = %label, "explicit command queued");
                Ok(())
            }
            Err(RelayError::NotConnected) => {
                warn!(command = %label, "not connected; command dropped, reconnecting");
                relay.connection.connect();
                Err(RelayError::NotConnected)
            }
            Err(e) => Err(e),
        }
    }

    /// The live connection state, or `Disconnected` when stopped.
    pub fn connection_state(&self) -> ConnectionState {
        self.lock()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |r| r.connection.state())
    }

    /// The endpoint of the running relay.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.lock().as_ref().map(|r| r.connection.endpoint().clone())
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningRelay>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for RelayService {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump_directions(
    mut directions: mpsc::UnboundedReceiver<DirectionEvent>,
    connection: RelayConnection,
) {
    while let Some(direction) = directions.recv().await {
        let command = map_direction(direction);
        let label = command.to_string();
        match connection.send(command) {
            Ok(()) => debug!(?direction, command = %label, "command queued"),
            Err(RelayError::NotConnected) => {
                warn!(command = %label, "not connected; command dropped, reconnecting");
                connection.connect();
            }
            Err(e) => warn!(command = %label, "command not sent: {e}"),
        }
    }
    debug!("direction pump finished");
}

async fn forward_status(mut events: mpsc::Receiver<ConnectionEvent>, sink: Arc<dyn StatusSink>) {
    while let Some(event) = events.recv().await {
        let status = match event {
            ConnectionEvent::Connected => StatusEvent::connected(),
            ConnectionEvent::Closed { .. } => StatusEvent::disconnected(),
            ConnectionEvent::Error(e) => StatusEvent::failed(e.to_string()),
            ConnectionEvent::Message(text) => {
                debug!(frame = %text, "server message");
                continue;
            }
            ConnectionEvent::RetryScheduled { attempt, delay } => {
                debug!(attempt, ?delay, "retry scheduled");
                continue;
            }
        };
        if let Err(e) = sink.notify(&status) {
            error!(?status, "status delivery failed: {e}");
        }
    }
    debug!("status forwarder finished");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

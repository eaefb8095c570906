use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use orchestrator_protocol::{InboundEvent, OutboundEvent};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorApiError;
use crate::frames::{encode_frame, parse_frame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = Arc<Mutex<Option<mpsc::UnboundedSender<WsMessage>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Observable health of the agent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive reconnect attempts since the last successful open.
    pub attempts: u32,
    /// True once retries are exhausted or the channel was closed on request.
    /// No further automatic reconnect happens in this state.
    pub terminal: bool,
}

impl ConnectionStatus {
    fn new(state: ConnectionState, policy: &ReconnectPolicy, terminal: bool) -> Self {
        Self {
            state,
            attempts: policy.attempts(),
            terminal,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Item delivered to the single consumer of the agent channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Status(ConnectionStatus),
    Inbound(InboundEvent),
}

/// Owner of the one full-duplex channel to the orchestrator.
///
/// A background task holds the socket, reconnects on the configured
/// [`ReconnectPolicy`], and forwards decoded frames in arrival order. Each
/// reconnect is a new socket with no ordering relationship to the previous one.
pub struct ConnectionManager {
    status: Arc<watch::Sender<ConnectionStatus>>,
    writer: Writer,
    shutdown: watch::Sender<bool>,
    max_attempts: u32,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Opens the agent channel described by `config`.
    ///
    /// Must be called from within a tokio runtime. The returned receiver yields
    /// status transitions and inbound events in order.
    pub fn connect(
        config: &OrchestratorConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), OrchestratorApiError> {
        let url = config.channel_url()?;
        Ok(Self::connect_to(url, config.reconnect, config.heartbeat))
    }

    pub fn connect_to(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        heartbeat: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let url = url.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(ConnectionStatus::new(
            ConnectionState::Disconnected,
            &policy,
            false,
        ));
        let status = Arc::new(status_tx);
        let writer: Writer = Arc::new(Mutex::new(None));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_channel(ChannelTask {
            url,
            policy,
            heartbeat,
            status: Arc::clone(&status),
            writer: Arc::clone(&writer),
            events: events_tx,
            shutdown: shutdown_rx,
        }));

        (
            Self {
                status,
                writer,
                shutdown,
                max_attempts: policy.max_attempts(),
                task: Some(task),
            },
            events_rx,
        )
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    /// Sends one event if the channel is connected.
    ///
    /// Sends while disconnected are dropped with a warning and never buffered
    /// for a later connection. Returns whether the frame was handed to the
    /// socket writer.
    pub fn send(&self, event: &OutboundEvent) -> bool {
        if !self.status().is_connected() {
            warn!(kind = event.kind(), "agent channel not connected; dropping outbound event");
            return false;
        }

        let frame = match encode_frame(event) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(kind = event.kind(), %error, "failed to encode outbound event");
                return false;
            }
        };

        let writer = lock_unpoisoned(&self.writer);
        match writer.as_ref() {
            Some(sender) if sender.send(WsMessage::Text(frame)).is_ok() => {
                debug!(kind = event.kind(), "outbound event queued on socket writer");
                true
            }
            _ => {
                warn!(kind = event.kind(), "agent channel writer closed; dropping outbound event");
                false
            }
        }
    }

    /// Closes the channel and disables automatic reconnect.
    ///
    /// Any pending reconnect timer is cancelled.
    pub fn disconnect(&mut self) {
        lock_unpoisoned(&self.writer).take();
        let max_attempts = self.max_attempts;
        self.status.send_modify(|status| {
            status.state = ConnectionState::Disconnected;
            status.attempts = max_attempts;
            status.terminal = true;
        });
        let _ = self.shutdown.send(true);
        info!("agent channel disconnected on request");
    }

    /// Waits for the background task to finish after [`Self::disconnect`] or
    /// retry exhaustion.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

struct ChannelTask {
    url: String,
    policy: ReconnectPolicy,
    heartbeat: Option<Duration>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    writer: Writer,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    shutdown: watch::Receiver<bool>,
}

impl ChannelTask {
    fn publish(&self, state: ConnectionState, terminal: bool) {
        let status = ConnectionStatus::new(state, &self.policy, terminal);
        self.status.send_replace(status);
        let _ = self.events.send(ConnectionEvent::Status(status));
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }
}

async fn run_channel(mut task: ChannelTask) {
    loop {
        if task.shutdown_requested() {
            break;
        }

        task.publish(ConnectionState::Connecting, false);
        let mut shutdown = task.shutdown.clone();
        let connected = tokio::select! {
            result = connect_async(task.url.as_str()) => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok((socket, _)) => {
                task.policy.on_open();
                let (sender, outbound) = mpsc::unbounded_channel();
                *lock_unpoisoned(&task.writer) = Some(sender);
                task.publish(ConnectionState::Connected, false);
                info!(url = %task.url, "agent channel connected");

                let outcome = pump(socket, outbound, task.heartbeat, &task.events, &mut shutdown).await;
                lock_unpoisoned(&task.writer).take();
                match outcome {
                    Ok(()) => info!("agent channel closed"),
                    Err(error) => warn!(%error, "agent channel closed with error"),
                }
            }
            Err(error) => warn!(url = %task.url, %error, "agent channel connect failed"),
        }

        if task.shutdown_requested() {
            break;
        }

        let Some(delay) = task.policy.on_close() else {
            task.publish(ConnectionState::Disconnected, true);
            warn!(
                attempts = task.policy.attempts(),
                "agent channel reconnect attempts exhausted"
            );
            return;
        };

        task.publish(ConnectionState::Disconnected, false);
        debug!(
            attempt = task.policy.attempts(),
            delay_ms = delay.as_millis() as u64,
            "scheduling agent channel reconnect"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    task.policy.exhaust();
    task.publish(ConnectionState::Disconnected, true);
}

async fn pump(
    socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
    heartbeat: Option<Duration>,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), OrchestratorApiError> {
    let (mut sink, mut stream) = socket.split();
    let mut ticker = heartbeat.map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => forward_frame(&text, events),
                Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => forward_frame(text, events),
                    Err(error) => warn!(%error, "dropping non UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error.into()),
            },
            message = outbound.recv() => match message {
                Some(message) => sink.send(message).await?,
                None => {
                    let _ = sink.close().await;
                    return Ok(());
                }
            },
            _ = next_heartbeat(&mut ticker) => {
                sink.send(WsMessage::Text(encode_frame(&OutboundEvent::Ping)?)).await?;
            }
            _ = shutdown.changed() => {
                let _ = sink.close().await;
                return Ok(());
            }
        }
    }
}

fn forward_frame(text: &str, events: &mpsc::UnboundedSender<ConnectionEvent>) {
    match parse_frame(text) {
        Ok(event) => {
            debug!(kind = event.kind(), "inbound agent event");
            let _ = events.send(ConnectionEvent::Inbound(event));
        }
        Err(error) => warn!(%error, "dropping malformed agent frame"),
    }
}

async fn next_heartbeat(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

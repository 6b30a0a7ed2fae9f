//! Reconnecting websocket transport.
//!
//! The transport stays runtime-agnostic: a background worker thread owns the socket and talks
//! to the rest of the crate through `std::sync::mpsc` channels. Every successful connection is
//! announced as [`SocketEvent::Opened`] with a fresh [`ConnectionId`]; frames and the final close
//! are tagged with that id so consumers can discard traffic from connections they no longer
//! track.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{HandshakeError, Message, WebSocket};
use url::Url;

/// How long a single socket read may block before the worker services outbound traffic.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Bounded exponential backoff between connection attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectOptions {
    /// Delay before the first retry.
    pub min_delay_ms: u64,
    /// Upper bound for any retry delay.
    pub max_delay_ms: u64,
    /// Multiplier applied per consecutive failed attempt.
    pub growth_factor: f64,
    /// Give up after this many consecutive retries (`None` retries forever).
    pub max_retries: Option<u32>,
    /// Bound for TCP connect plus websocket handshake.
    pub connection_timeout_ms: u64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            min_delay_ms: 1_000,
            max_delay_ms: 10_000,
            growth_factor: 1.3,
            max_retries: None,
            connection_timeout_ms: 10_000,
        }
    }
}

impl ReconnectOptions {
    /// Delay before retry number `retry` (1-based). Retry `0` is immediate.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let millis = self.min_delay_ms as f64 * self.growth_factor.powi(exponent);
        let capped = millis.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Connection timeout as a [`Duration`].
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

/// Identifies one physical socket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Write half of an open connection.
///
/// The socket is closed once every handle to its connection has been dropped.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
}

impl Connection {
    /// Wrap an outbound text channel.
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<String>) -> Self {
        Self { id, outbound }
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame. Fails once the connection's writer is gone.
    pub fn send_text(&self, text: String) -> Result<(), BridgeError> {
        self.outbound
            .send(text)
            .map_err(|_| BridgeError::ConnectionClosed(self.id))
    }
}

/// Events produced by a transport.
#[derive(Debug)]
pub enum SocketEvent {
    /// A new connection is ready for traffic.
    Opened(Connection),
    /// A text frame arrived.
    Message {
        /// Connection the frame arrived on.
        connection: ConnectionId,
        /// Frame payload.
        text: String,
    },
    /// The connection is gone; no further events carry its id.
    Closed(ConnectionId),
}

impl SocketEvent {
    /// Connection the event belongs to.
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            SocketEvent::Opened(connection) => connection.id(),
            SocketEvent::Message { connection, .. } => *connection,
            SocketEvent::Closed(id) => *id,
        }
    }
}

/// A source of [`SocketEvent`]s.
pub trait Transport {
    /// Wait up to `timeout` for the next event.
    ///
    /// `Ok(None)` means the wait timed out. [`BridgeError::TransportClosed`] means no event will
    /// ever arrive again.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<SocketEvent>, BridgeError>;
}

impl Transport for mpsc::Receiver<SocketEvent> {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<SocketEvent>, BridgeError> {
        match self.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::TransportClosed),
        }
    }
}

/// A websocket client that reconnects with bounded exponential backoff.
///
/// Dropping the socket stops its worker thread.
pub struct ReconnectingSocket {
    url: String,
    events: mpsc::Receiver<SocketEvent>,
    _stop: mpsc::Sender<()>,
    worker: JoinHandle<()>,
}

impl fmt::Debug for ReconnectingSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingSocket")
            .field("url", &self.url)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ReconnectingSocket {
    /// Start connecting to `url` (`ws://` or `wss://`) in the background.
    pub fn connect(url: &str, options: ReconnectOptions) -> Result<Self, BridgeError> {
        let parsed = Url::parse(url).map_err(|source| BridgeError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(BridgeError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported socket scheme '{}'", parsed.scheme()),
            )));
        }

        let (tx_events, rx_events) = mpsc::channel();
        let (tx_stop, rx_stop) = mpsc::channel();
        let worker = {
            let url = url.to_string();
            thread::Builder::new()
                .name("ovbridge-socket".to_string())
                .spawn(move || socket_worker(url, options, tx_events, rx_stop))?
        };

        Ok(Self {
            url: url.to_string(),
            events: rx_events,
            _stop: tx_stop,
            worker,
        })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `false` once the worker gave up (retries exhausted).
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }
}

impl Transport for ReconnectingSocket {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<SocketEvent>, BridgeError> {
        self.events.next_event(timeout)
    }
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    Reconnect,
    Stop,
}

fn stop_requested(stop: &mpsc::Receiver<()>) -> bool {
    !matches!(stop.try_recv(), Err(TryRecvError::Empty))
}

fn socket_worker(
    url: String,
    options: ReconnectOptions,
    events: mpsc::Sender<SocketEvent>,
    stop: mpsc::Receiver<()>,
) {
    let mut next_id = 1u64;
    let mut retries = 0u32;

    loop {
        if stop_requested(&stop) {
            return;
        }

        match open_socket(&url, options.connection_timeout()) {
            Ok(socket) => {
                retries = 0;
                let id = ConnectionId(next_id);
                next_id += 1;
                tracing::info!(%url, connection = %id, "socket connected");

                let (tx_out, rx_out) = mpsc::channel();
                if events
                    .send(SocketEvent::Opened(Connection::new(id, tx_out)))
                    .is_err()
                {
                    return;
                }

                let exit = pump(socket, id, &events, &rx_out, &stop);
                tracing::info!(%url, connection = %id, "socket closed");
                if events.send(SocketEvent::Closed(id)).is_err() || exit == PumpExit::Stop {
                    return;
                }
            }
            Err(err) => tracing::warn!(%url, error = %err, "socket connection failed"),
        }

        retries = retries.saturating_add(1);
        if let Some(max) = options.max_retries
            && retries > max
        {
            tracing::warn!(%url, max_retries = max, "giving up reconnecting");
            return;
        }

        let delay = options.delay_for_retry(retries);
        tracing::debug!(%url, retry = retries, delay_ms = delay.as_millis() as u64, "reconnecting");
        match stop.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn open_socket(url: &str, timeout: Duration) -> Result<Socket, BridgeError> {
    let parsed = Url::parse(url).map_err(|source| BridgeError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    let deadline = Instant::now() + timeout;

    let mut last_err = None;
    let mut stream = None;
    for addr in socket_addrs(&parsed)? {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(BridgeError::Timeout("socket connect"));
        }
        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(err) => last_err = Some(err),
        }
    }
    let stream = match stream {
        Some(stream) => stream,
        None => {
            return Err(last_err
                .unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("no address for {url}"))
                })
                .into());
        }
    };
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;

    let mut handshake = tungstenite::client_tls(url, stream);
    loop {
        match handshake {
            Ok((socket, _response)) => return Ok(socket),
            Err(HandshakeError::Interrupted(mid)) => {
                if Instant::now() >= deadline {
                    return Err(BridgeError::Timeout("websocket handshake"));
                }
                handshake = mid.handshake();
            }
            Err(HandshakeError::Failure(err)) => return Err(err.into()),
        }
    }
}

/// Resolve the host of a `ws`/`wss` URL. IPv6 literals keep working because `url` strips the
/// brackets before resolution.
fn socket_addrs(url: &Url) -> io::Result<Vec<SocketAddr>> {
    url.socket_addrs(|| None)
}

fn is_idle(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::Io(io_err)
            if matches!(io_err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
    )
}

fn pump(
    mut socket: Socket,
    id: ConnectionId,
    events: &mpsc::Sender<SocketEvent>,
    outbound: &mpsc::Receiver<String>,
    stop: &mpsc::Receiver<()>,
) -> PumpExit {
    loop {
        if stop_requested(stop) {
            let _ = socket.close(None);
            let _ = socket.flush();
            return PumpExit::Stop;
        }

        loop {
            match outbound.try_recv() {
                Ok(text) => {
                    if let Err(err) = socket.send(Message::text(text)) {
                        tracing::warn!(connection = %id, error = %err, "socket write failed");
                        return PumpExit::Reconnect;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!(connection = %id, "connection released; closing socket");
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return PumpExit::Reconnect;
                }
            }
        }

        let text = match socket.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(connection = %id, "dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                tracing::debug!(connection = %id, ?frame, "close frame received");
                continue;
            }
            Ok(_) => continue,
            Err(err) if is_idle(&err) => {
                let _ = socket.flush();
                continue;
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return PumpExit::Reconnect;
            }
            Err(err) => {
                tracing::warn!(connection = %id, error = %err, "socket read failed");
                return PumpExit::Reconnect;
            }
        };

        if events
            .send(SocketEvent::Message {
                connection: id,
                text,
            })
            .is_err()
        {
            return PumpExit::Stop;
        }
    }
}

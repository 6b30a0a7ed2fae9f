//! Protocol session over one connection.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::lsp_client::{IncomingMessage, LspClient};
use crate::lsp_events::ClientNotification;
use crate::lsp_transport::{Connection, ConnectionId, SocketEvent, Transport};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Options used to start a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Timeout for the `initialize` response.
    pub initialize_timeout: Duration,
    /// `clientInfo.name`.
    pub client_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for SessionOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            initialize_timeout: config.initialize_timeout(),
            client_name: config.client_name.clone(),
        }
    }
}

/// Server identity from the `initialize` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Optional version string.
    pub version: Option<String>,
}

/// Client-side state of one language server session.
#[derive(Debug)]
pub struct Session {
    client: LspClient,
    server_info: Option<ServerInfo>,
    capabilities: Value,
    started: bool,
}

impl Session {
    /// Wrap a freshly opened connection. Nothing is sent until [`Session::start`].
    pub fn new(connection: Connection) -> Self {
        Self {
            client: LspClient::new(connection),
            server_info: None,
            capabilities: Value::Null,
            started: false,
        }
    }

    /// Id of the connection this session runs on.
    pub fn id(&self) -> ConnectionId {
        self.client.connection_id()
    }

    /// Run the `initialize` / `initialized` handshake.
    ///
    /// Server requests that arrive while waiting are answered. Every other event read from
    /// `transport` is appended to `backlog` in arrival order.
    pub fn start<T>(
        &mut self,
        transport: &mut T,
        backlog: &mut VecDeque<SocketEvent>,
        options: &SessionOptions,
    ) -> Result<(), BridgeError>
    where
        T: Transport + ?Sized,
    {
        let request_id = self.client.request(
            "initialize",
            json!({
                "processId": Value::Null,
                "clientInfo": { "name": options.client_name },
                "rootUri": Value::Null,
                "capabilities": {},
            }),
        )?;

        let deadline = Instant::now() + options.initialize_timeout;
        let mut deferred = Vec::new();
        let response = loop {
            let now = Instant::now();
            if now >= deadline {
                break Err(BridgeError::Timeout("initialize response"));
            }
            let event = match transport.next_event(deadline - now) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(err) => break Err(err),
            };

            match event {
                SocketEvent::Message { connection, text } if connection == self.id() => {
                    match IncomingMessage::parse(&text) {
                        Ok(message) if message.is_response_to(request_id) => break Ok(message),
                        Ok(IncomingMessage::Request { id, method, params }) => {
                            if let Err(err) = self.client.handle_server_request(id, &method, &params)
                            {
                                break Err(err);
                            }
                        }
                        _ => deferred.push(SocketEvent::Message { connection, text }),
                    }
                }
                SocketEvent::Closed(closed) if closed == self.id() => {
                    deferred.push(SocketEvent::Closed(closed));
                    break Err(BridgeError::ConnectionClosed(closed));
                }
                other => deferred.push(other),
            }
        };
        backlog.extend(deferred);

        if let IncomingMessage::Response { result, error, .. } = response? {
            if let Some(error) = error {
                return Err(BridgeError::Initialize(error.message));
            }
            let result = result.unwrap_or(Value::Null);
            self.server_info = parse_server_info(&result);
            self.capabilities = result.get("capabilities").cloned().unwrap_or(Value::Null);
        }

        self.client.notify("initialized", json!({}))?;
        self.started = true;
        Ok(())
    }

    /// Send a bridge notification.
    pub fn notify(&self, notification: &ClientNotification) -> Result<(), BridgeError> {
        self.client
            .notify(notification.method(), notification.params())
    }

    /// Answer a server request with a headless default.
    pub fn answer_request(
        &self,
        id: Value,
        method: &str,
        params: &Value,
    ) -> Result<(), BridgeError> {
        self.client.handle_server_request(id, method, params)
    }

    /// Server identity, if reported.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Raw server capabilities.
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    /// `true` once the handshake completed.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

fn parse_server_info(result: &Value) -> Option<ServerInfo> {
    let info = result.get("serverInfo")?;
    let name = info.get("name").and_then(Value::as_str)?;
    Some(ServerInfo {
        name: name.to_string(),
        version: info
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn options() -> SessionOptions {
        SessionOptions {
            initialize_timeout: Duration::from_millis(200),
            client_name: "test".to_string(),
        }
    }

    fn message(id: u64, value: Value) -> SocketEvent {
        SocketEvent::Message {
            connection: ConnectionId(id),
            text: value.to_string(),
        }
    }

    #[test]
    fn test_start_defers_unrelated_events_in_order() {
        let (tx_out, rx_out) = mpsc::channel();
        let (tx_events, mut rx_events) = mpsc::channel();
        let mut session = Session::new(Connection::new(ConnectionId(1), tx_out));

        tx_events
            .send(message(1, json!({ "jsonrpc": "2.0", "method": "a", "params": {} })))
            .unwrap();
        tx_events
            .send(message(1, json!({ "jsonrpc": "2.0", "id": 5, "method": "client/registerCapability" })))
            .unwrap();
        tx_events
            .send(message(1, json!({ "jsonrpc": "2.0", "method": "b", "params": {} })))
            .unwrap();
        tx_events
            .send(message(1, json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": { "capabilities": {}, "serverInfo": { "name": "ov-ls", "version": "2.1" } },
            })))
            .unwrap();

        let mut backlog = VecDeque::new();
        session.start(&mut rx_events, &mut backlog, &options()).unwrap();
        assert!(session.is_started());
        assert_eq!(session.server_info().unwrap().name, "ov-ls");

        let deferred: Vec<String> = backlog
            .iter()
            .map(|event| match event {
                SocketEvent::Message { text, .. } => {
                    serde_json::from_str::<Value>(text).unwrap()["method"].to_string()
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(deferred, vec!["\"a\"", "\"b\""]);

        let sent: Vec<Value> = rx_out
            .try_iter()
            .map(|text| serde_json::from_str(&text).unwrap())
            .collect();
        assert_eq!(sent[0]["method"], "initialize");
        assert_eq!(sent[1]["id"], 5);
        assert_eq!(sent[2]["method"], "initialized");
    }

    #[test]
    fn test_start_reports_initialize_error() {
        let (tx_out, _rx_out) = mpsc::channel();
        let (tx_events, mut rx_events) = mpsc::channel();
        let mut session = Session::new(Connection::new(ConnectionId(1), tx_out));
        tx_events
            .send(message(1, json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -1, "message": "nope" } })))
            .unwrap();

        let err = session
            .start(&mut rx_events, &mut VecDeque::new(), &options())
            .unwrap_err();
        assert!(matches!(err, BridgeError::Initialize(msg) if msg == "nope"));
        assert!(!session.is_started());
    }

    #[test]
    fn test_start_times_out() {
        let (tx_out, _rx_out) = mpsc::channel();
        let (_tx_events, mut rx_events) = mpsc::channel::<SocketEvent>();
        let mut session = Session::new(Connection::new(ConnectionId(1), tx_out));
        let err = session
            .start(&mut rx_events, &mut VecDeque::new(), &options())
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
    }

    #[test]
    fn test_start_fails_when_connection_closes() {
        let (tx_out, _rx_out) = mpsc::channel();
        let (tx_events, mut rx_events) = mpsc::channel();
        let mut session = Session::new(Connection::new(ConnectionId(3), tx_out));
        tx_events.send(SocketEvent::Closed(ConnectionId(3))).unwrap();

        let mut backlog = VecDeque::new();
        let err = session.start(&mut rx_events, &mut backlog, &options()).unwrap_err();
        assert!(matches!(err, BridgeError::ConnectionClosed(ConnectionId(3))));
        assert!(matches!(backlog.pop_front(), Some(SocketEvent::Closed(ConnectionId(3)))));
    }

    #[test]
    fn test_start_stops_waiting_when_transport_is_gone() {
        let (tx_out, _rx_out) = mpsc::channel();
        let (tx_events, mut rx_events) = mpsc::channel::<SocketEvent>();
        drop(tx_events);
        let mut session = Session::new(Connection::new(ConnectionId(1), tx_out));

        let options = SessionOptions {
            initialize_timeout: Duration::from_secs(30),
            ..options()
        };
        let started = Instant::now();
        let err = session
            .start(&mut rx_events, &mut VecDeque::new(), &options)
            .unwrap_err();
        assert!(matches!(err, BridgeError::TransportClosed));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

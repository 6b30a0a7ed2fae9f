//! Minimal JSON-RPC client over one websocket connection.
//!
//! Each websocket text frame carries exactly one JSON-RPC message, so no header framing is
//! needed. The client only shapes messages and queues them on the connection; reading is done
//! by whoever owns the transport.

use crate::error::BridgeError;
use crate::lsp_transport::{Connection, ConnectionId};
use serde::Deserialize;
use serde_json::{Value, json};

/// JSON-RPC `MethodNotFound`.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Optional structured data.
    #[serde(default)]
    pub data: Option<Value>,
}

/// A classified inbound JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Response to a client request.
    Response {
        /// Request id being answered.
        id: Value,
        /// Result payload, if successful.
        result: Option<Value>,
        /// Error payload, if failed.
        error: Option<ResponseError>,
    },
    /// Server-initiated request that expects an answer.
    Request {
        /// Request id (number or string).
        id: Value,
        /// Method name.
        method: String,
        /// Params (`null` if absent).
        params: Value,
    },
    /// Server-initiated notification.
    Notification {
        /// Method name.
        method: String,
        /// Params (`null` if absent).
        params: Value,
    },
}

fn malformed(reason: &str) -> BridgeError {
    BridgeError::MalformedMessage(<serde_json::Error as serde::de::Error>::custom(reason))
}

impl IncomingMessage {
    /// Parse one websocket frame.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_str(text).map_err(BridgeError::MalformedMessage)?;
        let Value::Object(mut obj) = value else {
            return Err(malformed("JSON-RPC message must be an object"));
        };

        let id = obj.remove("id").filter(|id| !id.is_null());
        let method = match obj.remove("method") {
            Some(Value::String(method)) => Some(method),
            Some(_) => return Err(malformed("JSON-RPC method must be a string")),
            None => None,
        };
        let params = obj.remove("params").unwrap_or(Value::Null);

        match (id, method) {
            (Some(id), Some(method)) => Ok(Self::Request { id, method, params }),
            (None, Some(method)) => Ok(Self::Notification { method, params }),
            (Some(id), None) => {
                let error = obj
                    .remove("error")
                    .map(serde_json::from_value::<ResponseError>)
                    .transpose()
                    .map_err(BridgeError::MalformedMessage)?;
                Ok(Self::Response {
                    id,
                    result: obj.remove("result"),
                    error,
                })
            }
            (None, None) => Err(malformed("JSON-RPC message has neither id nor method")),
        }
    }

    /// Returns `true` if this is the response to request `request_id`.
    pub fn is_response_to(&self, request_id: u64) -> bool {
        matches!(self, Self::Response { id, .. } if id.as_u64() == Some(request_id))
    }
}

/// A JSON-RPC client bound to one connection.
#[derive(Debug)]
pub struct LspClient {
    connection: Connection,
    next_id: u64,
}

impl LspClient {
    /// Create a client; request ids start at 1.
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            next_id: 1,
        }
    }

    /// Id of the underlying connection.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Send a notification.
    pub fn notify(&self, method: &str, params: Value) -> Result<(), BridgeError> {
        self.send(json!({ "jsonrpc": "2.0", "method": method, "params": params }))
    }

    /// Send a request and return its id.
    pub fn request(&mut self, method: &str, params: Value) -> Result<u64, BridgeError> {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))?;
        Ok(id)
    }

    /// Answer a server request successfully.
    pub fn respond(&self, id: Value, result: Value) -> Result<(), BridgeError> {
        self.send(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    /// Answer a server request with an error.
    pub fn respond_error(
        &self,
        id: Value,
        code: i64,
        message: impl Into<String>,
    ) -> Result<(), BridgeError> {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message.into() },
        }))
    }

    /// Answer a server request with a headless default.
    ///
    /// Servers block on some requests until the client replies, so every request gets an answer:
    /// known methods get an empty result, anything else gets `MethodNotFound`.
    pub fn handle_server_request(
        &self,
        id: Value,
        method: &str,
        params: &Value,
    ) -> Result<(), BridgeError> {
        let result = match method {
            "workspace/configuration" => {
                let item_count = params
                    .get("items")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Value::Array(vec![Value::Null; item_count])
            }
            "workspace/workspaceFolders"
            | "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create"
            | "window/showMessageRequest"
            | "workspace/semanticTokens/refresh" => Value::Null,
            _ => {
                tracing::debug!(method, "rejecting unsupported server request");
                return self.respond_error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("unsupported request '{method}'"),
                );
            }
        };
        self.respond(id, result)
    }

    fn send(&self, message: Value) -> Result<(), BridgeError> {
        self.connection.send_text(message.to_string())
    }
}

//! Error type shared by the bridge modules.

use crate::lsp_transport::ConnectionId;
use ovbridge_editor::WorkspaceError;
use ovbridge_highlight::ClassifierError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors produced by the protocol bridge.
pub enum BridgeError {
    #[error("invalid socket url '{url}': {source}")]
    /// The configured socket URL does not parse.
    InvalidUrl {
        /// The URL that was built.
        url: String,
        /// The parser error.
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value for environment variable {key}: '{value}'")]
    /// An environment override could not be parsed.
    InvalidEnv {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    #[error("malformed JSON-RPC message: {0}")]
    /// A frame from the server is not a JSON-RPC message.
    MalformedMessage(#[source] serde_json::Error),

    #[error("malformed payload for '{method}': {source}")]
    /// A notification payload failed to decode.
    MalformedPayload {
        /// Notification method.
        method: String,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected payload for '{method}': expected {expected}")]
    /// A notification payload has the wrong JSON shape.
    UnexpectedPayload {
        /// Notification method.
        method: String,
        /// What the payload should have been.
        expected: &'static str,
    },

    #[error(transparent)]
    /// A semantic highlighting pattern failed to compile.
    Classifier(#[from] ClassifierError),

    #[error("initialize failed: {0}")]
    /// The server answered `initialize` with an error.
    Initialize(String),

    #[error("timed out waiting for {0}")]
    /// A bounded wait elapsed.
    Timeout(&'static str),

    #[error("connection {0} closed")]
    /// The connection closed while a session needed it.
    ConnectionClosed(ConnectionId),

    #[error("transport has no more events")]
    /// The transport stopped for good (retries exhausted or its source went away).
    TransportClosed,

    #[error(transparent)]
    /// Editor state could not be updated.
    Workspace(#[from] WorkspaceError),

    #[error("websocket error: {0}")]
    /// The websocket library reported an error.
    Socket(#[from] tungstenite::Error),

    #[error("I/O error: {0}")]
    /// Transport I/O failed.
    Io(#[from] io::Error),
}

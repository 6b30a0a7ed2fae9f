#![warn(missing_docs)]
//! `ovbridge-lsp` - connects the ovbridge editor surfaces to a language server over a
//! reconnecting websocket.
//!
//! The crate is layered bottom-up:
//!
//! - [`lsp_uri`] / [`config`]: where the language service lives
//! - [`lsp_transport`]: the reconnecting websocket and the [`Transport`] seam
//! - [`lsp_client`]: JSON-RPC message shaping and classification
//! - [`lsp_events`]: the typed ovbridge notifications
//! - [`session`]: the `initialize` handshake for one connection
//! - [`bridge`]: [`EditorProtocolBridge`], which ties all of the above to a [`BridgeContext`]
//!
//! Everything is runtime-agnostic: the websocket runs on its own thread and the bridge is driven
//! by calling [`EditorProtocolBridge::poll`].

pub mod bridge;
pub mod config;
pub mod error;
pub mod lsp_client;
pub mod lsp_events;
pub mod lsp_transport;
pub mod lsp_uri;
pub mod session;

pub use bridge::{BridgeContext, BridgeEvent, EditorProtocolBridge};
pub use config::{BridgeConfig, DEFAULT_PORT, PORT_ENV_VAR, SERVICE_PATH};
pub use error::BridgeError;
pub use lsp_client::{IncomingMessage, LspClient, METHOD_NOT_FOUND, ResponseError};
pub use lsp_events::{
    ClientNotification, GeneratedCode, HighlightRule, LogMessageParams, MessageType,
    ServerNotification,
};
pub use lsp_transport::{
    Connection, ConnectionId, ReconnectOptions, ReconnectingSocket, SocketEvent, Transport,
};
pub use lsp_uri::{PageLocation, document_uri_for_path, normalize_path, scheme_for, socket_url};
pub use session::{ServerInfo, Session, SessionOptions};

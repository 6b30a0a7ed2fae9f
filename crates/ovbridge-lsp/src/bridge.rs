//! The editor <-> language server bridge.
//!
//! [`EditorProtocolBridge`] owns the transport and a single [`BridgeContext`] (editor surfaces,
//! content store, page controls). It is driven by [`EditorProtocolBridge::poll`]:
//!
//! 1. queued document changes are dispatched by language id
//!    - `yaml` (schema): notify the server, then store the text under `Schema`
//!    - `ov` (primary): store the text under `Code`
//! 2. at most one transport event is handled
//!    - `Opened` starts a new session, then reports the current schema and option state
//!    - messages from the active connection are answered or applied to the context
//!    - `Closed` of the active connection releases the session
//!
//! A session whose handshake fails is dropped together with its connection, which makes the
//! transport close that socket and reconnect with backoff.
//!
//! Events tagged with any other connection id belong to a session that is already gone and are
//! dropped. Outbound notifications are fire-and-forget: when there is no session, or the send
//! fails, the notification is logged and discarded.

use crate::error::BridgeError;
use crate::lsp_client::IncomingMessage;
use crate::lsp_events::{ClientNotification, MessageType, ServerNotification};
use crate::lsp_transport::{ConnectionId, SocketEvent, Transport};
use crate::session::{Session, SessionOptions};
use ovbridge_editor::{
    ContentKey, ContentManager, DocumentChange, EditorWorkspace, OptionKind, PageControls,
    Surface,
};
use ovbridge_highlight::TokenClassifier;
use ovbridge_lang::{OV_LANGUAGE_ID, SCHEMA_LANGUAGE_ID};
use std::collections::VecDeque;
use std::time::Duration;

/// Everything the bridge reads and writes besides the transport.
#[derive(Debug, Default)]
pub struct BridgeContext {
    /// Editor surfaces and language state.
    pub workspace: EditorWorkspace,
    /// Shared key-value store.
    pub content: ContentManager,
    /// Optional option selectors.
    pub controls: PageControls,
}

impl BridgeContext {
    /// Bundle the editor state.
    pub fn new(workspace: EditorWorkspace, content: ContentManager, controls: PageControls) -> Self {
        Self {
            workspace,
            content,
            controls,
        }
    }
}

/// Observable outcome of one [`EditorProtocolBridge::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A session finished its handshake and the initial state was sent.
    SessionStarted(ConnectionId),
    /// The active session's connection closed.
    SessionClosed(ConnectionId),
    /// A server notification was applied to the context.
    Notification(ServerNotification),
}

/// Connects editor state to a language server over a [`Transport`].
#[derive(Debug)]
pub struct EditorProtocolBridge<T: Transport> {
    transport: T,
    context: BridgeContext,
    options: SessionOptions,
    session: Option<Session>,
    backlog: VecDeque<SocketEvent>,
}

impl<T: Transport> EditorProtocolBridge<T> {
    /// Create a bridge. No traffic happens until [`EditorProtocolBridge::poll`].
    pub fn new(transport: T, context: BridgeContext, options: SessionOptions) -> Self {
        Self {
            transport,
            context,
            options,
            session: None,
            backlog: VecDeque::new(),
        }
    }

    /// Editor state.
    pub fn context(&self) -> &BridgeContext {
        &self.context
    }

    /// Mutable editor state.
    ///
    /// Text changes made through the workspace are dispatched on the next poll.
    pub fn context_mut(&mut self) -> &mut BridgeContext {
        &mut self.context
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Active session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// `true` while a started session is active.
    pub fn is_ready(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_started)
    }

    /// Dispatch queued document changes, then handle at most one transport event.
    ///
    /// Waits up to `timeout` for an event. Malformed server traffic is returned as an error;
    /// the bridge stays usable afterwards. [`BridgeError::TransportClosed`] means the transport
    /// has stopped for good.
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<BridgeEvent>, BridgeError> {
        self.dispatch_document_changes();

        let event = match self.backlog.pop_front() {
            Some(event) => event,
            None => match self.transport.next_event(timeout)? {
                Some(event) => event,
                None => return Ok(None),
            },
        };
        self.handle_event(event)
    }

    /// Replace the text of a surface and dispatch the change immediately.
    pub fn edit(
        &mut self,
        surface: Surface,
        text: impl Into<String>,
    ) -> Result<DocumentChange, BridgeError> {
        let change = self.context.workspace.set_text(surface, text)?;
        self.dispatch_document_changes();
        Ok(change)
    }

    /// Select `value` in the control for `kind`, as a user would.
    ///
    /// Returns `false` when the control is absent or does not offer `value`.
    pub fn select_option(&mut self, kind: OptionKind, value: &str) -> bool {
        let Some(control) = self.context.controls.get_mut(kind) else {
            tracing::debug!(control = kind.control_id(), "control not present");
            return false;
        };
        if !control.select(value) {
            tracing::debug!(control = kind.control_id(), value, "unknown option value");
            return false;
        }
        self.option_changed(kind);
        true
    }

    /// The control for `kind` changed: store the selection and notify the server.
    pub fn option_changed(&mut self, kind: OptionKind) {
        let Some(value) = self
            .context
            .controls
            .get(kind)
            .and_then(|control| control.selected_value())
            .map(str::to_string)
        else {
            return;
        };

        self.context.content.set(kind.content_key(), value.clone());
        send_option(&self.context, self.session.as_ref(), kind, value);
    }

    /// Send the current schema text.
    pub fn send_schema_state(&self) {
        send_schema_state(&self.context, self.session.as_ref());
    }

    /// Send the current culture and language selections.
    pub fn send_option_state(&mut self) {
        send_option_state(&mut self.context, self.session.as_ref());
    }

    fn dispatch_document_changes(&mut self) {
        for change in self.context.workspace.take_changes() {
            dispatch_change(&mut self.context, self.session.as_ref(), change);
        }
    }

    fn handle_event(&mut self, event: SocketEvent) -> Result<Option<BridgeEvent>, BridgeError> {
        let active = self.session.as_ref().map(Session::id);

        match event {
            SocketEvent::Opened(connection) => {
                let id = connection.id();
                if let Some(previous) = self.session.take() {
                    tracing::debug!(previous = %previous.id(), next = %id, "replacing session");
                }

                let mut session = Session::new(connection);
                if let Err(err) = session.start(&mut self.transport, &mut self.backlog, &self.options)
                {
                    tracing::warn!(connection = %id, error = %err, "session start failed");
                    // The session held the only handle to the connection. Releasing it makes the
                    // transport close the socket and reconnect.
                    drop(session);
                    return Ok(None);
                }

                match session.server_info() {
                    Some(info) => tracing::info!(
                        connection = %id,
                        server = %info.name,
                        version = info.version.as_deref().unwrap_or(""),
                        "session started"
                    ),
                    None => tracing::info!(connection = %id, "session started"),
                }
                self.session = Some(session);
                self.send_schema_state();
                self.send_option_state();
                Ok(Some(BridgeEvent::SessionStarted(id)))
            }
            SocketEvent::Closed(id) if Some(id) == active => {
                self.session = None;
                tracing::info!(connection = %id, "session closed");
                Ok(Some(BridgeEvent::SessionClosed(id)))
            }
            SocketEvent::Message { connection, text } if Some(connection) == active => {
                self.handle_message(&text)
            }
            stale => {
                tracing::debug!(connection = %stale.connection_id(), "dropping event from stale connection");
                Ok(None)
            }
        }
    }

    fn handle_message(&mut self, text: &str) -> Result<Option<BridgeEvent>, BridgeError> {
        match IncomingMessage::parse(text)? {
            IncomingMessage::Request { id, method, params } => {
                if let Some(session) = &self.session
                    && let Err(err) = session.answer_request(id, &method, &params)
                {
                    tracing::warn!(%method, error = %err, "failed to answer server request");
                }
                Ok(None)
            }
            IncomingMessage::Response { id, .. } => {
                tracing::debug!(%id, "ignoring unexpected response");
                Ok(None)
            }
            IncomingMessage::Notification { method, params } => {
                match ServerNotification::from_method_and_params(&method, &params)? {
                    Some(notification) => {
                        apply_notification(&mut self.context, &notification)?;
                        Ok(Some(BridgeEvent::Notification(notification)))
                    }
                    None => {
                        tracing::debug!(%method, "ignoring unknown notification");
                        Ok(None)
                    }
                }
            }
        }
    }
}

fn send(session: Option<&Session>, notification: ClientNotification) {
    let Some(session) = session else {
        tracing::debug!(method = notification.method(), "no active session; notification dropped");
        return;
    };
    if let Err(err) = session.notify(&notification) {
        tracing::warn!(method = notification.method(), error = %err, "notification send failed");
    }
}

fn primary_uri(context: &BridgeContext) -> Option<String> {
    context.workspace.uri(Surface::Primary).map(str::to_string)
}

fn send_schema(context: &BridgeContext, session: Option<&Session>, schema: String) {
    let Some(uri) = primary_uri(context) else {
        tracing::debug!("primary surface not open; schema notification skipped");
        return;
    };
    send(session, ClientNotification::SchemaChanged { schema, uri });
}

fn send_option(context: &BridgeContext, session: Option<&Session>, kind: OptionKind, value: String) {
    let Some(uri) = primary_uri(context) else {
        tracing::debug!(control = kind.control_id(), "primary surface not open; option skipped");
        return;
    };
    send(session, ClientNotification::for_option(kind, value, uri));
}

fn send_schema_state(context: &BridgeContext, session: Option<&Session>) {
    if let Some(schema) = context.workspace.text(Surface::Schema) {
        send_schema(context, session, schema.to_string());
    }
}

/// Stored selections win over control defaults and are reflected back into the controls.
fn send_option_state(context: &mut BridgeContext, session: Option<&Session>) {
    for kind in OptionKind::ALL {
        let stored = context.content.get(kind.content_key()).map(str::to_string);
        let control = context.controls.get_mut(kind);

        let value = match (stored, control) {
            (Some(stored), Some(control)) => {
                control.select(&stored);
                Some(stored)
            }
            (Some(stored), None) => Some(stored),
            (None, Some(control)) => control.selected_value().map(str::to_string),
            (None, None) => None,
        };

        if let Some(value) = value {
            send_option(context, session, kind, value);
        }
    }
}

fn dispatch_change(context: &mut BridgeContext, session: Option<&Session>, change: DocumentChange) {
    if change.surface == Surface::Output {
        return;
    }

    match change.language_id.as_str() {
        SCHEMA_LANGUAGE_ID => {
            send_schema(context, session, change.text.clone());
            context.content.set(ContentKey::Schema, change.text);
        }
        OV_LANGUAGE_ID => context.content.set(ContentKey::Code, change.text),
        other => tracing::trace!(language = other, "no handler for document change"),
    }
}

fn apply_notification(
    context: &mut BridgeContext,
    notification: &ServerNotification,
) -> Result<(), BridgeError> {
    match notification {
        ServerNotification::SemanticHighlighting(rules) => {
            let classifier = TokenClassifier::from_pairs(
                rules.iter().map(|rule| (rule.pattern.as_str(), rule.class.clone())),
            )?;
            tracing::debug!(rules = classifier.len(), "highlighting rules replaced");
            context
                .workspace
                .set_token_classifier(OV_LANGUAGE_ID, classifier);
        }
        ServerNotification::GeneratedCode(code) => {
            if !context.workspace.is_open(Surface::Output) {
                tracing::debug!("output surface not open; generated code dropped");
                return Ok(());
            }
            context
                .workspace
                .set_text(Surface::Output, code.implementation.clone())?;
            context
                .workspace
                .set_language(Surface::Output, code.language.to_lowercase())?;
        }
        ServerNotification::CommentKeywordChanged(keyword) => {
            if !context
                .workspace
                .languages_mut()
                .set_line_comment(OV_LANGUAGE_ID, keyword.clone())
            {
                tracing::debug!("primary language not registered; comment keyword ignored");
            }
        }
        ServerNotification::LogMessage(params) | ServerNotification::ShowMessage(params) => {
            log_server_message(params.typ, &params.message);
        }
    }
    Ok(())
}

fn log_server_message(typ: MessageType, message: &str) {
    match typ {
        MessageType::Error => tracing::error!(target: "ovbridge::server", "{message}"),
        MessageType::Warning => tracing::warn!(target: "ovbridge::server", "{message}"),
        MessageType::Info => tracing::info!(target: "ovbridge::server", "{message}"),
        MessageType::Log => tracing::debug!(target: "ovbridge::server", "{message}"),
    }
}

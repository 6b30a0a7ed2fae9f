use ovbridge_editor::{
    ContentKey, ContentManager, EditorWorkspace, OptionKind, PageControls, Surface,
};
use ovbridge_highlight::TokenClass;
use ovbridge_lsp::{
    BridgeContext, BridgeError, BridgeEvent, Connection, ConnectionId, EditorProtocolBridge,
    GeneratedCode, ServerNotification, SessionOptions, SocketEvent,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::mpsc;
use std::time::Duration;

const PRIMARY_URI: &str = "file:///work/main.ov";
const POLL: Duration = Duration::from_millis(50);

type Bridge = EditorProtocolBridge<mpsc::Receiver<SocketEvent>>;

struct Harness {
    events: mpsc::Sender<SocketEvent>,
    bridge: Bridge,
}

fn context(with_output: bool) -> BridgeContext {
    let mut workspace = EditorWorkspace::new();
    workspace.open(Surface::Primary, PRIMARY_URI, "ov", "");
    workspace.open(Surface::Schema, "file:///work/schema.yaml", "yaml", "a: 1");
    if with_output {
        workspace.open(Surface::Output, "inmemory://output", "plaintext", "");
    }
    BridgeContext::new(
        workspace,
        ContentManager::new(),
        PageControls::from_values(["en-US", "de-DE"], ["Java", "CSharp"]),
    )
}

fn harness(context: BridgeContext) -> Harness {
    let (events, rx) = mpsc::channel();
    let options = SessionOptions {
        initialize_timeout: Duration::from_millis(500),
        client_name: "bridge-tests".to_string(),
    };
    Harness {
        events,
        bridge: EditorProtocolBridge::new(rx, context, options),
    }
}

fn frame(connection: u64, value: Value) -> SocketEvent {
    SocketEvent::Message {
        connection: ConnectionId(connection),
        text: value.to_string(),
    }
}

fn notification(connection: u64, method: &str, params: Value) -> SocketEvent {
    frame(
        connection,
        json!({ "jsonrpc": "2.0", "method": method, "params": params }),
    )
}

impl Harness {
    /// Open connection `id`, queue its initialize response, and poll until the session starts.
    fn connect(&mut self, id: u64) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel();
        self.events
            .send(SocketEvent::Opened(Connection::new(ConnectionId(id), tx)))
            .unwrap();
        self.events
            .send(frame(
                id,
                json!({ "jsonrpc": "2.0", "id": 1, "result": { "capabilities": {} } }),
            ))
            .unwrap();

        assert_eq!(
            self.bridge.poll(POLL).unwrap(),
            Some(BridgeEvent::SessionStarted(ConnectionId(id)))
        );
        rx
    }

    fn push(&self, event: SocketEvent) {
        self.events.send(event).unwrap();
    }
}

/// Drain sent frames, keeping only ovbridge notifications as `(method, params)`.
fn sent_notifications(rx: &mpsc::Receiver<String>) -> Vec<(String, Value)> {
    rx.try_iter()
        .map(|text| serde_json::from_str::<Value>(&text).unwrap())
        .filter_map(|msg| {
            let method = msg.get("method")?.as_str()?.to_string();
            method
                .starts_with("ov/")
                .then(|| (method, msg["params"].clone()))
        })
        .collect()
}

#[test]
fn test_session_start_handshakes_then_sends_state() {
    let mut ctx = context(true);
    ctx.content.set(ContentKey::Language, "CSharp");
    let mut h = harness(ctx);

    let (tx, rx) = mpsc::channel();
    h.push(SocketEvent::Opened(Connection::new(ConnectionId(1), tx)));
    h.push(frame(
        1,
        json!({ "jsonrpc": "2.0", "id": 1, "result": { "capabilities": {}, "serverInfo": { "name": "ov-ls" } } }),
    ));
    assert_eq!(
        h.bridge.poll(POLL).unwrap(),
        Some(BridgeEvent::SessionStarted(ConnectionId(1)))
    );
    assert!(h.bridge.is_ready());
    assert_eq!(h.bridge.session().unwrap().server_info().unwrap().name, "ov-ls");

    let sent: Vec<Value> = rx
        .try_iter()
        .map(|text| serde_json::from_str(&text).unwrap())
        .collect();
    let methods: Vec<&str> = sent.iter().map(|m| m["method"].as_str().unwrap()).collect();
    assert_eq!(
        methods,
        vec![
            "initialize",
            "initialized",
            "ov/schemaChanged",
            "ov/cultureChanged",
            "ov/languageChanged",
        ]
    );
    assert_eq!(sent[2]["params"], json!({ "schema": "a: 1", "uri": PRIMARY_URI }));
    assert_eq!(sent[3]["params"], json!({ "culture": "en-US", "uri": PRIMARY_URI }));
    assert_eq!(sent[4]["params"], json!({ "language": "CSharp", "uri": PRIMARY_URI }));

    // The stored language is reflected into the control without a store write.
    let ctx = h.bridge.context();
    assert_eq!(
        ctx.controls.get(OptionKind::Language).unwrap().selected_value(),
        Some("CSharp")
    );
    assert_eq!(ctx.content.revision(), 1);
}

#[test]
fn test_generated_code_sets_output_text_and_lowercased_language() {
    let mut h = harness(context(true));
    let _rx = h.connect(1);

    h.push(notification(
        1,
        "ov/generatedCodeUpdated",
        json!({ "language": "Java", "implementation": "class A {}" }),
    ));
    assert_eq!(
        h.bridge.poll(POLL).unwrap(),
        Some(BridgeEvent::Notification(ServerNotification::GeneratedCode(
            GeneratedCode {
                language: "Java".to_string(),
                implementation: "class A {}".to_string(),
            }
        )))
    );

    let output = h.bridge.context().workspace.model(Surface::Output).unwrap();
    assert_eq!(output.text, "class A {}");
    assert_eq!(output.language_id, "java");
}

#[test]
fn test_generated_code_without_output_surface_is_a_no_op() {
    let mut h = harness(context(false));
    let _rx = h.connect(1);

    h.push(notification(
        1,
        "ov/generatedCodeUpdated",
        json!("{\"language\":\"Java\",\"implementation\":\"x\"}"),
    ));
    assert!(matches!(
        h.bridge.poll(POLL).unwrap(),
        Some(BridgeEvent::Notification(_))
    ));
    assert!(!h.bridge.context().workspace.is_open(Surface::Output));
}

#[test]
fn test_semantic_highlighting_replaces_classifier_and_skips_empty_patterns() {
    let mut h = harness(context(true));
    let _rx = h.connect(1);
    h.bridge.edit(Surface::Primary, "let x = 42").unwrap();

    h.push(notification(
        1,
        "ov/semanticHighlightingUpdated",
        json!([["\\blet\\b", "keyword"], ["", "string"], ["\\d+", "number"]]),
    ));
    h.bridge.poll(POLL).unwrap();
    let ctx = h.bridge.context();
    assert_eq!(ctx.workspace.token_classifier("ov").unwrap().len(), 2);
    let classes: Vec<TokenClass> = ctx
        .workspace
        .classify(Surface::Primary)
        .into_iter()
        .map(|span| span.class)
        .collect();
    assert_eq!(classes, vec![TokenClass::Keyword, TokenClass::Number]);

    h.push(notification(
        1,
        "ov/semanticHighlightingUpdated",
        json!([["x", "variable"]]),
    ));
    h.bridge.poll(POLL).unwrap();
    let ctx = h.bridge.context();
    assert_eq!(ctx.workspace.token_classifier("ov").unwrap().len(), 1);
    assert_eq!(ctx.workspace.classify(Surface::Primary)[0].class, TokenClass::Variable);
}

#[test]
fn test_schema_edit_sends_once_and_stores_schema() {
    let mut h = harness(context(true));
    let rx = h.connect(1);
    sent_notifications(&rx);
    let before = h.bridge.context().content.revision();

    h.bridge.edit(Surface::Schema, "a: 2").unwrap();

    assert_eq!(
        sent_notifications(&rx),
        vec![(
            "ov/schemaChanged".to_string(),
            json!({ "schema": "a: 2", "uri": PRIMARY_URI })
        )]
    );
    let content = &h.bridge.context().content;
    assert_eq!(content.revision(), before + 1);
    assert_eq!(content.get(ContentKey::Schema), Some("a: 2"));
}

#[test]
fn test_primary_edit_only_stores_code() {
    let mut h = harness(context(true));
    let rx = h.connect(1);
    sent_notifications(&rx);
    let before = h.bridge.context().content.revision();

    // Changes made directly on the workspace are dispatched by the next poll.
    h.bridge
        .context_mut()
        .workspace
        .set_text(Surface::Primary, "entity A")
        .unwrap();
    assert_eq!(h.bridge.poll(POLL).unwrap(), None);

    assert!(sent_notifications(&rx).is_empty());
    let content = &h.bridge.context().content;
    assert_eq!(content.revision(), before + 1);
    assert_eq!(content.get(ContentKey::Code), Some("entity A"));
}

#[test]
fn test_culture_selection_stores_and_notifies() {
    let mut h = harness(context(true));
    let rx = h.connect(1);
    sent_notifications(&rx);

    assert!(h.bridge.select_option(OptionKind::Culture, "de-DE"));
    assert_eq!(
        sent_notifications(&rx),
        vec![(
            "ov/cultureChanged".to_string(),
            json!({ "culture": "de-DE", "uri": PRIMARY_URI })
        )]
    );
    assert_eq!(h.bridge.context().content.get(ContentKey::Culture), Some("de-DE"));

    assert!(!h.bridge.select_option(OptionKind::Culture, "xx-XX"));
    assert!(sent_notifications(&rx).is_empty());
}

#[test]
fn test_missing_controls_are_skipped() {
    let mut ctx = context(true);
    ctx.controls = PageControls::none();
    let mut h = harness(ctx);
    let rx = h.connect(1);

    let methods: Vec<String> = sent_notifications(&rx).into_iter().map(|(m, _)| m).collect();
    assert_eq!(methods, vec!["ov/schemaChanged".to_string()]);
    assert!(!h.bridge.select_option(OptionKind::Language, "Java"));
}

#[test]
fn test_comment_keyword_replaces_line_comment_only() {
    let mut h = harness(context(true));
    let _rx = h.connect(1);

    h.push(notification(1, "ov/commentKeywordChanged", json!("--")));
    h.bridge.poll(POLL).unwrap();

    let comments = &h.bridge.context().workspace.languages().get("ov").unwrap().comments;
    assert_eq!(comments.line.as_deref(), Some("--"));
    assert_eq!(comments.block_start.as_deref(), Some("/*"));
    assert_eq!(comments.block_end.as_deref(), Some("*/"));
}

#[test]
fn test_events_from_closed_session_are_dropped() {
    let mut h = harness(context(true));
    let rx1 = h.connect(1);
    sent_notifications(&rx1);

    h.push(SocketEvent::Closed(ConnectionId(1)));
    assert_eq!(
        h.bridge.poll(POLL).unwrap(),
        Some(BridgeEvent::SessionClosed(ConnectionId(1)))
    );
    assert!(!h.bridge.is_ready());

    // A late frame from the closed connection must not touch the editor.
    h.push(notification(
        1,
        "ov/generatedCodeUpdated",
        json!({ "language": "Java", "implementation": "late" }),
    ));
    assert_eq!(h.bridge.poll(POLL).unwrap(), None);
    assert_eq!(h.bridge.context().workspace.text(Surface::Output), Some(""));

    // Edits while disconnected still reach the store.
    h.bridge.edit(Surface::Schema, "a: 3").unwrap();
    assert_eq!(h.bridge.context().content.get(ContentKey::Schema), Some("a: 3"));

    let rx2 = h.connect(2);
    let resent = sent_notifications(&rx2);
    assert_eq!(resent[0].1["schema"], json!("a: 3"));

    h.push(notification(1, "ov/commentKeywordChanged", json!(";")));
    assert_eq!(h.bridge.poll(POLL).unwrap(), None);
    let ov = h.bridge.context().workspace.languages().get("ov").unwrap();
    assert_eq!(ov.comments.line.as_deref(), Some("//"));

    h.bridge.edit(Surface::Schema, "a: 4").unwrap();
    assert!(sent_notifications(&rx1).is_empty());
    assert_eq!(sent_notifications(&rx2).len(), 1);
}

#[test]
fn test_malformed_payload_is_an_error_and_bridge_survives() {
    let mut h = harness(context(true));
    let _rx = h.connect(1);

    h.push(notification(1, "ov/generatedCodeUpdated", json!("{broken")));
    assert!(matches!(
        h.bridge.poll(POLL),
        Err(BridgeError::MalformedPayload { .. })
    ));

    h.push(frame(1, json!("not an object")));
    assert!(matches!(
        h.bridge.poll(POLL),
        Err(BridgeError::MalformedMessage(_))
    ));

    h.push(notification(
        1,
        "ov/semanticHighlightingUpdated",
        json!([["(unclosed", "keyword"]]),
    ));
    assert!(matches!(h.bridge.poll(POLL), Err(BridgeError::Classifier(_))));

    h.push(notification(
        1,
        "ov/generatedCodeUpdated",
        json!({ "language": "CSharp", "implementation": "class B {}" }),
    ));
    assert!(h.bridge.poll(POLL).unwrap().is_some());
    assert_eq!(
        h.bridge.context().workspace.model(Surface::Output).unwrap().language_id,
        "csharp"
    );
}

#[test]
fn test_server_requests_are_answered() {
    let mut h = harness(context(true));
    let rx = h.connect(1);
    rx.try_iter().for_each(drop);

    h.push(frame(
        1,
        json!({ "jsonrpc": "2.0", "id": 7, "method": "workspace/configuration", "params": { "items": [{}] } }),
    ));
    assert_eq!(h.bridge.poll(POLL).unwrap(), None);

    let reply: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
    assert_eq!(reply, json!({ "jsonrpc": "2.0", "id": 7, "result": [null] }));
}

#[test]
fn test_failed_handshake_releases_connection_and_next_one_starts() {
    let mut h = harness(context(true));
    let (tx, rx) = mpsc::channel();
    h.push(SocketEvent::Opened(Connection::new(ConnectionId(1), tx)));
    h.push(frame(
        1,
        json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32603, "message": "boom" } }),
    ));

    assert_eq!(h.bridge.poll(POLL).unwrap(), None);
    assert!(h.bridge.session().is_none());

    // Only the initialize request went out, then every handle to the connection was dropped,
    // which is what tells the socket worker to hang up and reconnect.
    let sent: Vec<String> = rx.try_iter().collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected));

    h.push(notification(1, "ov/commentKeywordChanged", json!("#")));
    h.push(SocketEvent::Closed(ConnectionId(1)));
    assert_eq!(h.bridge.poll(POLL).unwrap(), None);
    assert_eq!(h.bridge.poll(POLL).unwrap(), None);

    let rx = h.connect(2);
    assert!(h.bridge.is_ready());
    assert_eq!(sent_notifications(&rx)[0].0, "ov/schemaChanged");
}

#[test]
fn test_poll_reports_closed_transport() {
    let h = harness(context(true));
    let Harness { events, mut bridge } = h;
    drop(events);
    assert!(matches!(bridge.poll(POLL), Err(BridgeError::TransportClosed)));
}

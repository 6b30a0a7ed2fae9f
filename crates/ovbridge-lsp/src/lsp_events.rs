//! Typed ovbridge protocol messages.
//!
//! Client -> server traffic is limited to three notifications that report editor state. The
//! server pushes highlighting rules, generated code, and comment syntax back. Payloads may arrive
//! either as JSON structures or as strings that contain JSON; both forms decode the same way.

use crate::error::BridgeError;
use ovbridge_editor::OptionKind;
use ovbridge_highlight::TokenClass;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Client -> server: schema surface text changed.
pub const SCHEMA_CHANGED: &str = "ov/schemaChanged";
/// Client -> server: culture selection changed.
pub const CULTURE_CHANGED: &str = "ov/cultureChanged";
/// Client -> server: target language selection changed.
pub const LANGUAGE_CHANGED: &str = "ov/languageChanged";

/// Server -> client: replace the highlighting rule table.
pub const SEMANTIC_HIGHLIGHTING: &str = "ov/semanticHighlightingUpdated";
/// Server -> client: new generated code for the output surface.
pub const GENERATED_CODE: &str = "ov/generatedCodeUpdated";
/// Server -> client: new line-comment marker for the primary language.
pub const COMMENT_KEYWORD_CHANGED: &str = "ov/commentKeywordChanged";

/// A notification sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientNotification {
    /// Schema text changed.
    SchemaChanged {
        /// Full schema text.
        schema: String,
        /// Primary document URI.
        uri: String,
    },
    /// Culture selection changed.
    CultureChanged {
        /// Selected culture.
        culture: String,
        /// Primary document URI.
        uri: String,
    },
    /// Target language selection changed.
    LanguageChanged {
        /// Selected language.
        language: String,
        /// Primary document URI.
        uri: String,
    },
}

impl ClientNotification {
    /// Notification reporting an option selection.
    pub fn for_option(kind: OptionKind, value: impl Into<String>, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        match kind {
            OptionKind::Culture => Self::CultureChanged {
                culture: value.into(),
                uri,
            },
            OptionKind::Language => Self::LanguageChanged {
                language: value.into(),
                uri,
            },
        }
    }

    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::SchemaChanged { .. } => SCHEMA_CHANGED,
            Self::CultureChanged { .. } => CULTURE_CHANGED,
            Self::LanguageChanged { .. } => LANGUAGE_CHANGED,
        }
    }

    /// JSON-RPC params.
    pub fn params(&self) -> Value {
        match self {
            Self::SchemaChanged { schema, uri } => json!({ "schema": schema, "uri": uri }),
            Self::CultureChanged { culture, uri } => json!({ "culture": culture, "uri": uri }),
            Self::LanguageChanged { language, uri } => json!({ "language": language, "uri": uri }),
        }
    }
}

/// One `(pattern, class)` highlighting rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRule {
    /// Regular expression.
    pub pattern: String,
    /// Class assigned to matches.
    pub class: TokenClass,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HighlightEntry {
    Pair(Option<String>, TokenClass),
    Object {
        pattern: Option<String>,
        #[serde(alias = "class", alias = "tokenClass", alias = "range")]
        token: TokenClass,
    },
}

impl HighlightEntry {
    fn into_rule(self) -> Option<HighlightRule> {
        let (pattern, class) = match self {
            HighlightEntry::Pair(pattern, class) => (pattern, class),
            HighlightEntry::Object { pattern, token } => (pattern, token),
        };
        pattern
            .filter(|p| !p.is_empty())
            .map(|pattern| HighlightRule { pattern, class })
    }
}

/// Generated code for the output surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedCode {
    /// Language the code is written in (e.g. `Java`).
    pub language: String,
    /// The code.
    pub implementation: String,
}

/// Severity of `window/logMessage` and `window/showMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Error.
    Error,
    /// Warning.
    Warning,
    /// Information.
    Info,
    /// Log (lowest severity).
    Log,
}

impl MessageType {
    /// Convert the numeric LSP message type.
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Info),
            4 => Some(Self::Log),
            _ => None,
        }
    }
}

/// Params of `window/logMessage` / `window/showMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessageParams {
    /// Severity.
    pub typ: MessageType,
    /// Text.
    pub message: String,
}

/// A notification pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotification {
    /// Replacement highlighting table (empty patterns already removed).
    SemanticHighlighting(Vec<HighlightRule>),
    /// Generated code for the output surface.
    GeneratedCode(GeneratedCode),
    /// Replacement line-comment marker for `ov`.
    CommentKeywordChanged(String),
    /// `window/logMessage`
    LogMessage(LogMessageParams),
    /// `window/showMessage`
    ShowMessage(LogMessageParams),
}

impl ServerNotification {
    /// Parse a notification by method name and params.
    ///
    /// Unknown methods yield `Ok(None)`; a known method with a malformed payload is an error.
    pub fn from_method_and_params(method: &str, params: &Value) -> Result<Option<Self>, BridgeError> {
        let notification = match method {
            SEMANTIC_HIGHLIGHTING => {
                let entries: Vec<HighlightEntry> = decode_payload(method, params)?;
                Self::SemanticHighlighting(
                    entries
                        .into_iter()
                        .filter_map(HighlightEntry::into_rule)
                        .collect(),
                )
            }
            GENERATED_CODE => Self::GeneratedCode(decode_payload(method, params)?),
            COMMENT_KEYWORD_CHANGED => match params {
                Value::String(keyword) => Self::CommentKeywordChanged(keyword.clone()),
                _ => {
                    return Err(BridgeError::UnexpectedPayload {
                        method: method.to_string(),
                        expected: "a string",
                    });
                }
            },
            "window/logMessage" => Self::LogMessage(log_message_params(method, params)?),
            "window/showMessage" => Self::ShowMessage(log_message_params(method, params)?),
            _ => return Ok(None),
        };
        Ok(Some(notification))
    }

    /// Method name this notification arrived under.
    pub fn method(&self) -> &'static str {
        match self {
            Self::SemanticHighlighting(_) => SEMANTIC_HIGHLIGHTING,
            Self::GeneratedCode(_) => GENERATED_CODE,
            Self::CommentKeywordChanged(_) => COMMENT_KEYWORD_CHANGED,
            Self::LogMessage(_) => "window/logMessage",
            Self::ShowMessage(_) => "window/showMessage",
        }
    }
}

fn decode_payload<T: DeserializeOwned>(method: &str, params: &Value) -> Result<T, BridgeError> {
    let decoded = match params {
        Value::String(raw) => serde_json::from_str(raw),
        other => T::deserialize(other),
    };
    decoded.map_err(|source| BridgeError::MalformedPayload {
        method: method.to_string(),
        source,
    })
}

fn log_message_params(method: &str, params: &Value) -> Result<LogMessageParams, BridgeError> {
    let typ = params
        .get("type")
        .and_then(Value::as_u64)
        .and_then(MessageType::from_u64);
    let message = params.get("message").and_then(Value::as_str);
    match (typ, message) {
        (Some(typ), Some(message)) => Ok(LogMessageParams {
            typ,
            message: message.to_string(),
        }),
        _ => Err(BridgeError::UnexpectedPayload {
            method: method.to_string(),
            expected: "{ type, message }",
        }),
    }
}

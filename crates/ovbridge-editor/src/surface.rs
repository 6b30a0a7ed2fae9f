//! Editor surfaces and their text models.

use std::fmt;

/// One of the three editable panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Surface {
    /// Main source-code pane (language id `ov`).
    Primary,
    /// Schema definition pane (language id `yaml`).
    Schema,
    /// Read-mostly pane showing server-generated code.
    Output,
}

impl Surface {
    /// All surfaces, in display order.
    pub const ALL: [Surface; 3] = [Surface::Primary, Surface::Schema, Surface::Output];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Primary => "primary",
            Surface::Schema => "schema",
            Surface::Output => "output",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The text model backing a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextModel {
    /// Document URI (e.g. `file:///...` or `inmemory://...`).
    pub uri: String,
    /// Language id (e.g. `"ov"`).
    pub language_id: String,
    /// Full text.
    pub text: String,
    /// Incremented on every text change; starts at 1.
    pub version: u64,
}

impl TextModel {
    /// Create a model at version 1.
    pub fn new(
        uri: impl Into<String>,
        language_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
            text: text.into(),
            version: 1,
        }
    }
}

/// A text change observed on one surface.
///
/// The change carries the model's language id at the time of the change; listeners dispatch on
/// it rather than on the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    /// Surface that changed.
    pub surface: Surface,
    /// URI of the changed model.
    pub uri: String,
    /// Language id of the changed model.
    pub language_id: String,
    /// Model version after the change.
    pub version: u64,
    /// Full text after the change.
    pub text: String,
}

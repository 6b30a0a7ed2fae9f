#![warn(missing_docs)]
//! `ovbridge-editor` - headless editor state for the ovbridge protocol bridge.
//!
//! # Overview
//!
//! The bridge talks to an editor that shows three independent surfaces:
//!
//! - the **primary** surface (language id `ov`), where the user writes source code
//! - the **schema** surface (language id `yaml`), holding the schema definition
//! - the **output** surface, showing code generated by the language server
//!
//! This crate models that editor without rendering anything:
//!
//! - [`workspace`] - text models per surface, a queue of document changes, token classifiers and
//!   language configuration
//! - [`content`] - the shared key-value store other parts of the page read from
//! - [`controls`] - the two optional `<select>` controls (culture, target language)
//!
//! ```rust
//! use ovbridge_editor::{EditorWorkspace, Surface};
//!
//! let mut workspace = EditorWorkspace::new();
//! workspace.open(Surface::Schema, "inmemory://schema.yaml", "yaml", "a: 1");
//! workspace.set_text(Surface::Schema, "a: 2").unwrap();
//!
//! let changes = workspace.take_changes();
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes[0].language_id, "yaml");
//! ```

pub mod content;
pub mod controls;
pub mod surface;
pub mod workspace;

pub use content::{ContentCallback, ContentError, ContentKey, ContentManager};
pub use controls::{
    CULTURE_SELECT_ID, LANGUAGE_SELECT_ID, OptionKind, PageControls, SelectControl, SelectOption,
};
pub use surface::{DocumentChange, Surface, TextModel};
pub use workspace::{EditorWorkspace, WorkspaceError};

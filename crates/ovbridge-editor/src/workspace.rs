//! Surface workspace.
//!
//! [`EditorWorkspace`] owns:
//! - one optional [`TextModel`] per [`Surface`]
//! - a FIFO queue of [`DocumentChange`] values, one per text mutation
//! - the token classifier installed for each language id
//! - the [`LanguageRegistry`] (comment syntax)
//!
//! Text mutations never notify anyone directly. Hosts drain the change queue with
//! [`EditorWorkspace::take_changes`] and dispatch the changes themselves.

use crate::surface::{DocumentChange, Surface, TextModel};
use ovbridge_highlight::{TokenClassifier, TokenSpan};
use ovbridge_lang::LanguageRegistry;
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

/// Workspace-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    /// The surface has no model.
    #[error("surface '{0}' has no open model")]
    SurfaceNotOpen(Surface),
}

/// Text models for the editor surfaces plus editor-wide language state.
#[derive(Debug)]
pub struct EditorWorkspace {
    models: BTreeMap<Surface, TextModel>,
    changes: VecDeque<DocumentChange>,
    classifiers: HashMap<String, TokenClassifier>,
    languages: LanguageRegistry,
}

impl Default for EditorWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorWorkspace {
    /// Create a workspace with no open surfaces and the default languages registered.
    pub fn new() -> Self {
        Self {
            models: BTreeMap::new(),
            changes: VecDeque::new(),
            classifiers: HashMap::new(),
            languages: LanguageRegistry::with_defaults(),
        }
    }

    /// Open (or replace) the model of a surface.
    ///
    /// Opening is not a text change and does not queue a [`DocumentChange`].
    pub fn open(
        &mut self,
        surface: Surface,
        uri: impl Into<String>,
        language_id: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.models
            .insert(surface, TextModel::new(uri, language_id, text));
    }

    /// Close a surface, returning its model.
    pub fn close(&mut self, surface: Surface) -> Option<TextModel> {
        self.models.remove(&surface)
    }

    /// Returns `true` if the surface has a model.
    pub fn is_open(&self, surface: Surface) -> bool {
        self.models.contains_key(&surface)
    }

    /// Get the model of a surface.
    pub fn model(&self, surface: Surface) -> Option<&TextModel> {
        self.models.get(&surface)
    }

    /// Current text of a surface.
    pub fn text(&self, surface: Surface) -> Option<&str> {
        self.models.get(&surface).map(|m| m.text.as_str())
    }

    /// URI of a surface.
    pub fn uri(&self, surface: Surface) -> Option<&str> {
        self.models.get(&surface).map(|m| m.uri.as_str())
    }

    /// Replace the full text of a surface and queue a [`DocumentChange`].
    pub fn set_text(
        &mut self,
        surface: Surface,
        text: impl Into<String>,
    ) -> Result<DocumentChange, WorkspaceError> {
        let model = self
            .models
            .get_mut(&surface)
            .ok_or(WorkspaceError::SurfaceNotOpen(surface))?;

        model.text = text.into();
        model.version = model.version.saturating_add(1);

        tracing::trace!(%surface, version = model.version, "document changed");
        let change = DocumentChange {
            surface,
            uri: model.uri.clone(),
            language_id: model.language_id.clone(),
            version: model.version,
            text: model.text.clone(),
        };
        self.changes.push_back(change.clone());
        Ok(change)
    }

    /// Change the language id of a surface. This is not a text change.
    pub fn set_language(
        &mut self,
        surface: Surface,
        language_id: impl Into<String>,
    ) -> Result<(), WorkspaceError> {
        let model = self
            .models
            .get_mut(&surface)
            .ok_or(WorkspaceError::SurfaceNotOpen(surface))?;
        model.language_id = language_id.into();
        Ok(())
    }

    /// Drain all queued document changes, oldest first.
    pub fn take_changes(&mut self) -> Vec<DocumentChange> {
        self.changes.drain(..).collect()
    }

    /// Returns `true` if document changes are waiting to be dispatched.
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Install the token classifier for a language, replacing any previous one.
    pub fn set_token_classifier(
        &mut self,
        language_id: impl Into<String>,
        classifier: TokenClassifier,
    ) {
        self.classifiers.insert(language_id.into(), classifier);
    }

    /// Token classifier installed for a language.
    pub fn token_classifier(&self, language_id: &str) -> Option<&TokenClassifier> {
        self.classifiers.get(language_id)
    }

    /// Classify the text of a surface with its language's classifier.
    ///
    /// Returns an empty list when the surface is closed or its language has no classifier.
    pub fn classify(&self, surface: Surface) -> Vec<TokenSpan> {
        let Some(model) = self.models.get(&surface) else {
            return Vec::new();
        };
        self.classifiers
            .get(&model.language_id)
            .map(|c| c.classify(&model.text))
            .unwrap_or_default()
    }

    /// Language configuration.
    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    /// Mutable language configuration.
    pub fn languages_mut(&mut self) -> &mut LanguageRegistry {
        &mut self.languages
    }
}

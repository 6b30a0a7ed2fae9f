#![warn(missing_docs)]
//! `ovbridge-lang` - data-driven language configuration for the ovbridge editor surfaces.
//!
//! This crate stays dependency-free. It knows the two language ids the bridge dispatches on and
//! keeps per-language comment syntax that the language server is allowed to rewrite at runtime.

use std::collections::BTreeMap;

/// Language id of the primary editable language.
pub const OV_LANGUAGE_ID: &str = "ov";

/// Language id of the schema surface.
pub const SCHEMA_LANGUAGE_ID: &str = "yaml";

/// Comment tokens/config for a given language.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentConfig {
    /// Line comment token (e.g. `//`, `#`).
    pub line: Option<String>,
    /// Block comment start token (e.g. `/*`).
    pub block_start: Option<String>,
    /// Block comment end token (e.g. `*/`).
    pub block_end: Option<String>,
}

impl CommentConfig {
    /// Create a config that supports only line comments.
    pub fn line(token: impl Into<String>) -> Self {
        Self {
            line: Some(token.into()),
            ..Self::default()
        }
    }

    /// Create a config that supports only block comments.
    pub fn block(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            line: None,
            block_start: Some(start.into()),
            block_end: Some(end.into()),
        }
    }

    /// Create a config that supports both line and block comments.
    pub fn line_and_block(
        line: impl Into<String>,
        block_start: impl Into<String>,
        block_end: impl Into<String>,
    ) -> Self {
        Self {
            line: Some(line.into()),
            block_start: Some(block_start.into()),
            block_end: Some(block_end.into()),
        }
    }

    /// Replace the line comment token. Block comment tokens are left as they are.
    pub fn set_line(&mut self, token: impl Into<String>) {
        self.line = Some(token.into());
    }

    /// Returns `true` if a line comment token is configured.
    pub fn has_line(&self) -> bool {
        self.line.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Returns `true` if both block comment tokens are configured.
    pub fn has_block(&self) -> bool {
        self.block_start.as_deref().is_some_and(|s| !s.is_empty())
            && self.block_end.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Configuration of one language known to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// Language id (e.g. `"ov"`).
    pub id: String,
    /// Comment syntax.
    pub comments: CommentConfig,
    /// Human-facing aliases (e.g. `"YAML"`).
    pub aliases: Vec<String>,
}

impl LanguageConfig {
    /// Create a language config without aliases.
    pub fn new(id: impl Into<String>, comments: CommentConfig) -> Self {
        Self {
            id: id.into(),
            comments,
            aliases: Vec::new(),
        }
    }

    /// Attach an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// Language configurations keyed by language id.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: BTreeMap<String, LanguageConfig>,
}

impl LanguageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `ov` and `yaml` languages registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            LanguageConfig::new(OV_LANGUAGE_ID, CommentConfig::line_and_block("//", "/*", "*/"))
                .with_alias("OV"),
        );
        registry.register(
            LanguageConfig::new(SCHEMA_LANGUAGE_ID, CommentConfig::line("#")).with_alias("YAML"),
        );
        registry
    }

    /// Register (or replace) a language.
    pub fn register(&mut self, config: LanguageConfig) {
        self.languages.insert(config.id.clone(), config);
    }

    /// Look up a language by id.
    pub fn get(&self, id: &str) -> Option<&LanguageConfig> {
        self.languages.get(id)
    }

    /// Look up a language by id for mutation.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut LanguageConfig> {
        self.languages.get_mut(id)
    }

    /// Returns `true` if the language is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.languages.contains_key(id)
    }

    /// Registered language ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    /// Replace the line comment token of a language.
    ///
    /// Returns `false` if the language is not registered.
    pub fn set_line_comment(&mut self, id: &str, token: impl Into<String>) -> bool {
        match self.languages.get_mut(id) {
            Some(config) => {
                config.comments.set_line(token);
                true
            }
            None => false,
        }
    }
}

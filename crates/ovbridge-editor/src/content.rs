//! Shared key-value content store.
//!
//! The page keeps the latest schema, code and option selections in a small store so that other
//! parts of the page can read them. [`ContentManager`] is that store: last write wins, every
//! write bumps a revision counter and notifies subscribers, and the whole map can be persisted
//! as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Keys of the shared content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContentKey {
    /// Latest schema surface text.
    Schema,
    /// Latest primary surface text.
    Code,
    /// Selected culture.
    Culture,
    /// Selected target language.
    Language,
}

impl ContentKey {
    /// Stable key name as stored on disk.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKey::Schema => "Schema",
            ContentKey::Code => "Code",
            ContentKey::Culture => "Culture",
            ContentKey::Language => "Language",
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while loading or saving the content store.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The persisted file is not a valid content map.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Callback invoked on every content write.
pub type ContentCallback = Box<dyn FnMut(ContentKey, &str) + Send>;

/// Shared key-value store (last write wins).
#[derive(Default)]
pub struct ContentManager {
    values: BTreeMap<ContentKey, String>,
    revision: u64,
    callbacks: Vec<ContentCallback>,
}

impl fmt::Debug for ContentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentManager")
            .field("values", &self.values)
            .field("revision", &self.revision)
            .field("subscriber_count", &self.callbacks.len())
            .finish()
    }
}

impl ContentManager {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store persisted with [`ContentManager::save`].
    ///
    /// A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(err.into()),
        };

        let values: BTreeMap<ContentKey, String> = serde_json::from_str(&raw)?;
        Ok(Self {
            values,
            ..Self::default()
        })
    }

    /// Persist all values as a JSON object.
    pub fn save(&self, path: &Path) -> Result<(), ContentError> {
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a value.
    pub fn get(&self, key: ContentKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Write a value and notify subscribers.
    pub fn set(&mut self, key: ContentKey, value: impl Into<String>) {
        let value = value.into();
        self.revision = self.revision.saturating_add(1);
        for callback in &mut self.callbacks {
            callback(key, &value);
        }
        self.values.insert(key, value);
    }

    /// Remove a value. Removal is not a write and does not notify subscribers.
    pub fn remove(&mut self, key: ContentKey) -> Option<String> {
        self.values.remove(&key)
    }

    /// Number of writes since this store was created or loaded.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Subscribe to writes.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(ContentKey, &str) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }
}

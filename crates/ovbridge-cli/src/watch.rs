//! Re-read edited documents from disk.
//!
//! Parent directories are watched instead of the files themselves so that editors which save by
//! replacing the file are still picked up.

use anyhow::{Context, Result};
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use ovbridge_editor::Surface;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

pub struct DocumentWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    events: mpsc::Receiver<DebounceEventResult>,
    targets: Vec<(PathBuf, Surface)>,
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl DocumentWatcher {
    pub fn new(files: &[(PathBuf, Surface)], debounce: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, tx).context("failed to start file watcher")?;

        let mut targets = Vec::with_capacity(files.len());
        for (path, surface) in files {
            let path = absolute(path);
            let dir = path.parent().unwrap_or(Path::new("."));
            debouncer
                .watcher()
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            tracing::debug!(path = %path.display(), %surface, "watching");
            targets.push((path, *surface));
        }

        Ok(Self {
            _debouncer: debouncer,
            events: rx,
            targets,
        })
    }

    /// Surfaces whose file changed since the last call.
    pub fn changed(&self) -> Vec<(Surface, PathBuf)> {
        let mut changed: Vec<(Surface, PathBuf)> = Vec::new();
        for result in self.events.try_iter() {
            let events = match result {
                Ok(events) => events,
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                    continue;
                }
            };
            for event in events {
                let event_path = absolute(&event.path);
                for (path, surface) in &self.targets {
                    if *path == event_path && !changed.iter().any(|(s, _)| s == surface) {
                        changed.push((*surface, path.clone()));
                    }
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_rewritten_file_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.yaml");
        let other = dir.path().join("notes.txt");
        fs::write(&schema, "a: 1").unwrap();

        let watcher =
            DocumentWatcher::new(&[(schema.clone(), Surface::Schema)], Duration::from_millis(50))
                .unwrap();
        fs::write(&other, "ignored").unwrap();
        fs::write(&schema, "a: 2").unwrap();
        fs::write(&schema, "a: 3").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut changed = Vec::new();
        while changed.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
            changed = watcher.changed();
        }
        assert_eq!(changed, vec![(Surface::Schema, absolute(&schema))]);
    }
}

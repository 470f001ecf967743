//! Watcher: long-running; reports every created or modified source file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use foreman_core::Action;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::LeafError;
use crate::runtime::{Outbox, Program};

pub struct Watcher {
    src_dir: PathBuf,
    _watcher: Option<RecommendedWatcher>,
    forwarder: Option<JoinHandle<()>>,
}

impl Watcher {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
            _watcher: None,
            forwarder: None,
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

#[async_trait]
impl Program for Watcher {
    async fn start(&mut self, out: &Outbox) -> Result<(), LeafError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = tx.send(event);
        })?;
        watcher.watch(&self.src_dir, RecursiveMode::Recursive)?;
        info!(src_dir = %self.src_dir.display(), "Watching for changes");

        let base = std::env::current_dir().unwrap_or_default();
        let out_events = out.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Watch error");
                        continue;
                    }
                };
                for path in changed_paths(&event, &base) {
                    debug!(path = %path, "File changed");
                    if out_events.send(Action::FileChanged { path }).is_err() {
                        return;
                    }
                }
            }
        }));
        self._watcher = Some(watcher);

        out.ready()
    }

    fn accepts(&self, _action: &Action) -> bool {
        false
    }

    async fn handle(&mut self, _command: Action, _out: &Outbox) -> Result<(), LeafError> {
        Ok(())
    }
}

/// Files created or modified by `event`, relative to `base` when below it.
pub fn changed_paths(event: &Event, base: &Path) -> Vec<String> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|path| !path.is_dir())
        .map(|path| {
            path.strip_prefix(base)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

use notify::event::EventKind;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::mpsc::{Receiver, channel};
use thiserror::Error;

#[derive(Clone, Debug)]
pub enum WatchSignal {
    Changed,
    Error(String),
}

/// Signals whenever a `.status` file in the cache dir changes.
#[derive(Debug)]
pub struct StatusDirWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<WatchSignal>,
}

impl StatusDirWatcher {
    pub fn try_recv(&self) -> Option<WatchSignal> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Error)]
pub enum WatchStatusDirError {
    #[error("failed to create status dir: {0}")]
    CreateDir(#[from] io::Error),

    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

pub fn watch_status_dir(path: &Path) -> Result<StatusDirWatcher, WatchStatusDirError> {
    fs::create_dir_all(path)?;
    let (tx, rx) = channel::<WatchSignal>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if touches_status_file(&event) {
                    let _ = tx.send(WatchSignal::Changed);
                }
            }
            Err(error) => {
                let _ = tx.send(WatchSignal::Error(error.to_string()));
            }
        },
        Config::default(),
    )?;

    watcher.watch(path, RecursiveMode::NonRecursive)?;

    Ok(StatusDirWatcher {
        _watcher: watcher,
        rx,
    })
}

fn touches_status_file(event: &notify::Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path.extension().and_then(|ext| ext.to_str()) == Some("status"))
}

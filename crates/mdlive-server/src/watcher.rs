//! File watching for live rebuilds.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Default wait before reacting to a rename or remove.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File contents were written
    Write,

    /// File was renamed away or removed, usually mid-save
    RenameOrRemove,
}

/// A normalized change to one watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Errors from the file watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Setup(String),

    #[error("Failed to watch {}: {message}", path.display())]
    Add { path: PathBuf, message: String },

    #[error("File watch error: {0}")]
    Notify(String),
}

/// Receiving side of a watcher: change events plus runtime errors.
pub struct WatchStream {
    pub events: async_mpsc::Receiver<ChangeEvent>,
    pub errors: async_mpsc::Receiver<WatchError>,
}

enum Signal {
    Fs(notify::Result<notify::Event>),
    Shutdown,
}

/// Watches a fixed set of files.
///
/// Events are forwarded from a dedicated thread. Dropping the watcher stops
/// that thread, which closes both channels of the [`WatchStream`].
pub struct FileWatcher {
    control: mpsc::Sender<Signal>,
}

impl FileWatcher {
    /// Start watching `paths`. Every path must exist.
    pub fn new(
        paths: &[PathBuf],
        settle_delay: Duration,
    ) -> Result<(Self, WatchStream), WatchError> {
        ensure_exists(paths)?;

        let (sync_tx, sync_rx) = mpsc::channel();
        let (event_tx, event_rx) = async_mpsc::channel(100);
        let (error_tx, error_rx) = async_mpsc::channel(16);

        let fs_tx = sync_tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let _ = fs_tx.send(Signal::Fs(res));
            })
            .map_err(|e| WatchError::Setup(e.to_string()))?;

        for path in paths {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|e| WatchError::Add {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
        }

        let forwarder = Forwarder {
            watcher,
            paths: paths.to_vec(),
            settle_delay,
            events: event_tx,
            errors: error_tx,
        };
        std::thread::Builder::new()
            .name("mdlive-watcher".to_string())
            .spawn(move || forwarder.run(sync_rx))
            .map_err(|e| WatchError::Setup(e.to_string()))?;

        Ok((
            Self { control: sync_tx },
            WatchStream {
                events: event_rx,
                errors: error_rx,
            },
        ))
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        let _ = self.control.send(Signal::Shutdown);
    }
}

struct Forwarder {
    watcher: RecommendedWatcher,
    paths: Vec<PathBuf>,
    settle_delay: Duration,
    events: async_mpsc::Sender<ChangeEvent>,
    errors: async_mpsc::Sender<WatchError>,
}

impl Forwarder {
    fn run(mut self, rx: mpsc::Receiver<Signal>) {
        while let Ok(signal) = rx.recv() {
            let event = match signal {
                Signal::Shutdown => break,
                Signal::Fs(Ok(event)) => event,
                Signal::Fs(Err(e)) => {
                    if self.errors.blocking_send(WatchError::Notify(e.to_string())).is_err() {
                        break;
                    }
                    continue;
                }
            };

            let Some(change) = normalize(&event) else {
                continue;
            };

            let settle = change.kind == ChangeKind::RenameOrRemove;
            if settle {
                std::thread::sleep(self.settle_delay);
            }

            if self.events.blocking_send(change).is_err() {
                break;
            }

            if settle {
                self.rewatch();
            }
        }

        tracing::debug!("file watcher stopped");
    }

    /// Re-add every watch. Editors that save by rename leave the old watch
    /// pointing at a file that no longer exists.
    fn rewatch(&mut self) {
        for path in &self.paths {
            let _ = self.watcher.unwatch(path);
            if let Err(e) = self.watcher.watch(path, RecursiveMode::NonRecursive) {
                tracing::debug!(path = %path.display(), error = %e, "could not re-watch file");
            }
        }
    }
}

/// Reduce a raw notify event to a [`ChangeEvent`], dropping kinds that never
/// require a rebuild.
pub fn normalize(event: &notify::Event) -> Option<ChangeEvent> {
    let kind = classify(&event.kind)?;
    let path = event.paths.first()?.clone();

    Some(ChangeEvent { path, kind })
}

fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Some(ChangeKind::Write),
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Remove(_) => {
            Some(ChangeKind::RenameOrRemove)
        }
        _ => None,
    }
}

/// Check that every path exists before handing it to the watcher.
pub fn ensure_exists(paths: &[PathBuf]) -> Result<(), WatchError> {
    match paths.iter().find(|p| !p.exists()) {
        Some(path) => Err(WatchError::Add {
            path: path.clone(),
            message: "file does not exist".to_string(),
        }),
        None => Ok(()),
    }
}

//! Rebuild loop driven by watcher events.

use std::sync::Arc;

use mdlive_render::{build, BuildRequest};

use crate::hub::ReloadNotifier;
use crate::watcher::{ChangeEvent, ChangeKind, WatchStream};

/// Counters reported when the loop finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RebuildStats {
    pub succeeded: usize,
    pub failed: usize,
    /// Failures after a rename or remove, assumed to be a save in progress
    pub suppressed: usize,
    pub watch_errors: usize,
}

/// Rebuilds the page on every change event.
pub struct RebuildLoop {
    request: BuildRequest,
    notifier: Option<Arc<dyn ReloadNotifier>>,
}

impl RebuildLoop {
    pub fn new(request: BuildRequest) -> Self {
        Self {
            request,
            notifier: None,
        }
    }

    /// Notify connected clients after each successful rebuild.
    pub fn with_notifier(mut self, notifier: Arc<dyn ReloadNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Consume events until the watcher shuts down.
    pub async fn run(self, stream: WatchStream) -> RebuildStats {
        let WatchStream {
            mut events,
            mut errors,
        } = stream;
        let mut stats = RebuildStats::default();
        let mut errors_open = true;

        loop {
            tokio::select! {
                biased;

                error = errors.recv(), if errors_open => match error {
                    Some(e) => {
                        tracing::error!(error = %e, "error watching files");
                        stats.watch_errors += 1;
                    }
                    None => errors_open = false,
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_event(&event, &mut stats).await,
                    None => break,
                },
            }
        }

        tracing::debug!(?stats, "rebuild loop finished");
        stats
    }

    async fn handle_event(&self, event: &ChangeEvent, stats: &mut RebuildStats) {
        tracing::info!(
            file = %event.path.display(),
            kind = ?event.kind,
            "change detected, rebuilding..."
        );

        // Builds do blocking file IO
        let request = self.request.clone();
        let result = match tokio::task::spawn_blocking(move || build(&request)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "rebuild task failed");
                stats.failed += 1;
                return;
            }
        };

        match result {
            Ok(report) => {
                tracing::info!(duration_ms = report.duration_ms, "rebuild successful");
                stats.succeeded += 1;
                if let Some(notifier) = &self.notifier {
                    notifier.notify_reload();
                }
            }
            Err(e) if event.kind == ChangeKind::RenameOrRemove => {
                tracing::debug!(error = %e, "ignoring build error while file is being replaced");
                stats.suppressed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "error rebuilding document");
                stats.failed += 1;
            }
        }
    }
}

//! Watch command: rebuild on every change until Ctrl-C.

use anyhow::{Context, Result};
use mdlive_render::build;
use mdlive_server::{FileWatcher, RebuildLoop};

use crate::config::Settings;

/// Run the watcher without a server.
pub async fn run(settings: Settings) -> Result<()> {
    let request = super::build_request(&settings)?;

    match build(&request) {
        Ok(_) => tracing::info!("initial build successful"),
        Err(e) => tracing::error!(error = %e, "error performing initial build"),
    }

    let (watcher, stream) = FileWatcher::new(&request.sources(), settings.settle_delay)
        .context("Failed to watch source files")?;

    tracing::info!("watching for changes...");

    tokio::select! {
        stats = RebuildLoop::new(request).run(stream) => {
            tracing::debug!(?stats, "watcher closed");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("stopping watcher");
        }
    }

    drop(watcher);

    Ok(())
}

//! Live reload server command.

use anyhow::Result;
use mdlive_server::{DevServer, DevServerConfig};

use crate::config::Settings;

/// Run the dev server.
pub async fn run(settings: Settings) -> Result<()> {
    let request = super::build_request(&settings)?;

    tracing::info!("Starting live reload server on port {}", settings.port);

    let config = DevServerConfig {
        host: settings.host,
        port: settings.port,
        open: settings.open,
        settle_delay: settings.settle_delay,
        write_timeout: settings.write_timeout,
        ..DevServerConfig::new(request)
    };

    DevServer::new(config).start().await?;

    Ok(())
}

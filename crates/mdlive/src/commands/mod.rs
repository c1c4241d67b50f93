pub mod build;
pub mod serve;
pub mod watch;

use anyhow::{Context, Result};
use mdlive_render::BuildRequest;

use crate::config::Settings;

/// Validate the configured paths into a build request.
fn build_request(settings: &Settings) -> Result<BuildRequest> {
    BuildRequest::new(
        settings.markdown.clone(),
        settings.template.clone(),
        settings.output.clone(),
    )
    .context("Invalid build configuration")
}

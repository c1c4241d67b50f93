//! One-shot build command.

use anyhow::{Context, Result};
use mdlive_render::build;

use crate::config::Settings;

/// Run a single build.
pub fn run(settings: Settings) -> Result<()> {
    let request = super::build_request(&settings)?;

    let report = build(&request).context("There was an error building the markdown document")?;

    tracing::info!(
        input = %request.markdown().display(),
        template = %request.template().display(),
        output = %report.output.display(),
        bytes = report.bytes,
        duration_ms = report.duration_ms,
        "the template was successfully rendered"
    );

    Ok(())
}

//! mdlive CLI - render a markdown post into an HTML template, with live reload.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::{ConfigFile, Overrides, Settings};

#[derive(Parser)]
#[command(name = "mdlive")]
#[command(about = "Render a markdown post into an HTML template, with live reload")]
#[command(version)]
pub struct Cli {
    /// The input markdown post file [default: post.md]
    #[arg(long)]
    markdown: Option<PathBuf>,

    /// The template file for the markdown document [default: template.html]
    #[arg(long)]
    template: Option<PathBuf>,

    /// The output html file [default: output.html]
    #[arg(long)]
    output: Option<PathBuf>,

    /// Watch for changes and rebuild
    #[arg(long)]
    watch: bool,

    /// Enable server with live reload (implies --watch)
    #[arg(long)]
    serve: bool,

    /// Port for the server [default: 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind the server to [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,

    /// Open the page in a browser once the server is up
    #[arg(long)]
    open: bool,

    /// Path to mdlive.toml config file
    #[arg(short, long, default_value = "mdlive.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let file_config = ConfigFile::load(&cli.config)?;
    let settings = Settings::resolve(
        file_config,
        Overrides {
            markdown: cli.markdown,
            template: cli.template,
            output: cli.output,
            host: cli.host,
            port: cli.port,
            open: cli.open,
        },
    );

    // Execute command
    if cli.serve {
        commands::serve::run(settings).await?;
    } else if cli.watch {
        commands::watch::run(settings).await?;
    } else {
        commands::build::run(settings)?;
    }

    Ok(())
}

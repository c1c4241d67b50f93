//! Configuration file (mdlive.toml) and flag merging.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub watch: WatchSection,
}

#[derive(Debug, Deserialize)]
pub struct BuildSection {
    #[serde(default = "default_markdown")]
    pub markdown: PathBuf,
    #[serde(default = "default_template")]
    pub template: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            markdown: default_markdown(),
            template: default_template(),
            output: default_output(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub open: bool,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: false,
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WatchSection {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_markdown() -> PathBuf {
    PathBuf::from("post.md")
}
fn default_template() -> PathBuf {
    PathBuf::from("template.html")
}
fn default_output() -> PathBuf {
    PathBuf::from("output.html")
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_write_timeout_ms() -> u64 {
    5000
}
fn default_settle_ms() -> u64 {
    100
}

impl ConfigFile {
    /// Load configuration from `path` if it exists.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());

        Ok(config)
    }
}

/// Values given on the command line, each overriding the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub markdown: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub open: bool,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub markdown: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
    pub host: String,
    pub port: u16,
    pub open: bool,
    pub settle_delay: Duration,
    pub write_timeout: Duration,
}

impl Settings {
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> Self {
        Self {
            markdown: overrides.markdown.unwrap_or(file.build.markdown),
            template: overrides.template.unwrap_or(file.build.template),
            output: overrides.output.unwrap_or(file.build.output),
            host: overrides.host.unwrap_or(file.server.host),
            port: overrides.port.unwrap_or(file.server.port),
            open: overrides.open || file.server.open,
            settle_delay: Duration::from_millis(file.watch.settle_ms),
            write_timeout: Duration::from_millis(file.server.write_timeout_ms),
        }
    }
}

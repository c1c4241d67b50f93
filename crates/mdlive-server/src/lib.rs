//! Live rebuild and reload for mdlive.
//!
//! Watches the markdown and template sources, rebuilds the page on change,
//! and pushes a reload signal to connected browsers over WebSockets.

pub mod hub;
pub mod rebuild;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use hub::{Client, ClientError, ClientId, HubHandle, LiveMessage, ReloadNotifier};
pub use rebuild::{RebuildLoop, RebuildStats};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{ChangeEvent, ChangeKind, FileWatcher, WatchError, WatchStream};
pub use websocket::{inject_live_reload, live_reload_script, LiveSink};

//! Development server implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use mdlive_render::{build, BuildRequest};

use crate::hub::{HubHandle, DEFAULT_WRITE_TIMEOUT};
use crate::rebuild::RebuildLoop;
use crate::watcher::{FileWatcher, WatchError, DEFAULT_SETTLE_DELAY};
use crate::websocket::{inject_live_reload, serve_connection, LiveSink};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Files to build and watch
    pub request: BuildRequest,

    /// Directory served for every path other than `/` and `/ws`
    pub static_dir: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Wait before rebuilding after a rename or remove
    pub settle_delay: Duration,

    /// Bound on a single write to one live-reload client
    pub write_timeout: Duration,
}

impl DevServerConfig {
    /// Configuration with default network and timing settings.
    pub fn new(request: BuildRequest) -> Self {
        Self {
            request,
            static_dir: PathBuf::from("."),
            port: 8080,
            host: "127.0.0.1".to_string(),
            open: false,
            settle_delay: DEFAULT_SETTLE_DELAY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {0}: {1}")]
    Bind(String, String),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Server error: {0}")]
    Serve(String),
}

/// Shared server state.
struct ServerState {
    output: PathBuf,
    address: String,
    hub: HubHandle<LiveSink>,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build once, then serve the page with live reload until Ctrl-C.
    pub async fn start(self) -> Result<(), ServerError> {
        let config = self.config;
        let address = config.address();

        match build(&config.request) {
            Ok(_) => tracing::info!("initial build successful"),
            Err(e) => tracing::error!(error = %e, "error performing initial build"),
        }

        let (watcher, stream) = FileWatcher::new(&config.request.sources(), config.settle_delay)?;

        let hub = HubHandle::<LiveSink>::spawn(config.write_timeout);

        let rebuild = RebuildLoop::new(config.request.clone()).with_notifier(Arc::new(hub.clone()));
        tokio::spawn(rebuild.run(stream));

        let state = Arc::new(ServerState {
            output: config.request.output().to_path_buf(),
            address: address.clone(),
            hub,
        });

        let app = router(state, &config.static_dir);

        let listener = tokio::net::TcpListener::bind(address.as_str())
            .await
            .map_err(|e| ServerError::Bind(address.clone(), e.to_string()))?;

        let url = format!("http://{}", address);
        tracing::info!(address = %url, "starting server, watching for changes...");

        if config.open {
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        // Stops the rebuild loop
        drop(watcher);
        tracing::info!("server stopped");

        Ok(())
    }
}

fn router(state: Arc<ServerState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Handler for the root page: the last build output plus the live-reload
/// script.
async fn index_handler(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let html = match tokio::fs::read_to_string(&state.output).await {
        Ok(html) => html,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not read output file: {}", e),
            )
                .into_response();
        }
    };

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(state.address.as_str());

    Html(inject_live_reload(&html, &format!("ws://{}/ws", host))).into_response()
}

/// Handler for the live-reload WebSocket endpoint.
async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::error!(error = %rejection, "failed to upgrade websocket");
            return rejection.into_response();
        }
    };

    let hub = state.hub.clone();
    ws.on_failed_upgrade(|e: axum::Error| {
        tracing::error!(error = %e, "failed to upgrade websocket");
    })
    .on_upgrade(move |socket| serve_connection(socket, hub))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn test_app(output_html: Option<&str>) -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let output = dir.path().join("output.html");
        if let Some(html) = output_html {
            fs::write(&output, html).unwrap();
        }
        fs::write(dir.path().join("style.css"), "body { margin: 0; }").unwrap();

        let state = Arc::new(ServerState {
            output,
            address: "127.0.0.1:8080".to_string(),
            hub: HubHandle::spawn(DEFAULT_WRITE_TIMEOUT),
        });
        let app = router(state, dir.path());

        (dir, app)
    }

    async fn fetch(app: Router, uri: &str, host: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri(uri);
        if let Some(host) = host {
            request = request.header(header::HOST, host);
        }
        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn default_config() {
        let request = BuildRequest::new("post.md", "template.html", "output.html").unwrap();
        let config = DevServerConfig::new(request);

        assert_eq!(config.port, 8080);
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert!(!config.open);
    }

    #[tokio::test]
    async fn index_injects_script_using_host_header() {
        let (_dir, app) = test_app(Some("<html><body><h1>Title</h1></body></html>"));

        let (status, body) = fetch(app, "/", Some("localhost:9000")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1>Title</h1>"));
        assert!(body.contains("new WebSocket('ws://localhost:9000/ws')"));
        assert!(body.ends_with("</script></body></html>"));
    }

    #[tokio::test]
    async fn index_without_output_is_a_server_error() {
        let (_dir, app) = test_app(None);

        let (status, body) = fetch(app, "/", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Could not read output file:"));
    }

    #[tokio::test]
    async fn serves_static_files() {
        let (_dir, app) = test_app(Some("<body></body>"));

        let (status, body) = fetch(app, "/style.css", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body { margin: 0; }");
    }

    #[tokio::test]
    async fn plain_request_to_ws_is_rejected() {
        let (_dir, app) = test_app(Some("<body></body>"));

        let (status, _) = fetch(app, "/ws", None).await;

        assert!(status.is_client_error());
    }
}

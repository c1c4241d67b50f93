//! Live-reload WebSocket connections.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, Stream, StreamExt};
use futures_util::SinkExt;

use crate::hub::{Client, ClientError, ClientId, HubHandle};

/// Write half of an upgraded live-reload socket, as owned by the hub.
pub type LiveSink = SplitSink<WebSocket, Message>;

/// Delay before the page reloads after losing its socket.
pub const RECONNECT_DELAY_MS: u64 = 2000;

impl Client for LiveSink {
    async fn send(&mut self, payload: &str) -> Result<(), ClientError> {
        SinkExt::send(self, Message::Text(payload.to_owned().into()))
            .await
            .map_err(|e| ClientError::Write(e.to_string()))
    }

    async fn close(mut self) {
        let _ = SinkExt::close(&mut self).await;
    }
}

/// Unregisters a client when dropped, including when its task panics.
struct Registration<C: Client> {
    id: ClientId,
    hub: HubHandle<C>,
}

impl<C: Client> Drop for Registration<C> {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

/// Serve one upgraded socket: hand the write half to the hub and watch the
/// read half for disconnects.
pub async fn serve_connection(socket: WebSocket, hub: HubHandle<LiveSink>) {
    let (sink, stream) = socket.split();
    watch_liveness(sink, stream, hub).await;
}

/// Register `client`, then read `stream` until it errors or ends.
///
/// Frame contents are ignored; the connection is only ever written to by the
/// hub.
pub async fn watch_liveness<C, S, T, E>(client: C, mut stream: S, hub: HubHandle<C>)
where
    C: Client,
    S: Stream<Item = Result<T, E>> + Unpin,
    E: std::fmt::Display,
{
    let id = hub.register(client);
    let _registration = Registration { id, hub };
    tracing::debug!(client = id, "live-reload client connected");

    while let Some(frame) = stream.next().await {
        if let Err(e) = frame {
            tracing::debug!(client = id, error = %e, "live-reload read failed");
            break;
        }
    }

    tracing::debug!(client = id, "live-reload client disconnected");
}

/// Generate the client-side live-reload script.
pub fn live_reload_script(ws_url: &str) -> String {
    format!(
        r#"<script>
  (function() {{
    const socket = new WebSocket('{ws_url}');
    socket.onmessage = function(event) {{
      if (event.data === 'reload') {{
        location.reload();
      }}
    }};
    socket.onclose = function() {{
      console.log('[mdlive] Live reload socket closed, reloading to reconnect...');
      setTimeout(function() {{ location.reload(); }}, {RECONNECT_DELAY_MS});
    }};
  }})();
</script>"#
    )
}

/// Insert the live-reload script before the first `</body>`.
///
/// Pages without a closing body tag are returned unchanged.
pub fn inject_live_reload(html: &str, ws_url: &str) -> String {
    let script = live_reload_script(ws_url);
    html.replacen("</body>", &format!("{script}</body>"), 1)
}

//! Development server with live reload support

use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tower_http::services::ServeDir;
use tracing::{debug, warn};

/// Path of the Server-Sent Events endpoint.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Live reload message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMessage {
    /// Full page reload.
    Reload,
}

/// Server state containing the reload broadcaster.
#[derive(Clone)]
pub struct ServerState {
    /// Broadcast channel for live reload events.
    pub reload_tx: broadcast::Sender<ReloadMessage>,
}

impl ServerState {
    /// Create a new server state.
    pub fn new() -> Self {
        let (reload_tx, _) = broadcast::channel(16);
        Self { reload_tx }
    }

    /// Send a reload notification to all connected clients.
    ///
    /// Returns the number of clients notified.
    pub fn notify_reload(&self) -> usize {
        let clients = self.reload_tx.send(ReloadMessage::Reload).unwrap_or(0);
        debug!(clients, "reload sent");
        clients
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the development server router.
///
/// Static files come from `output_dir`; HTML responses get the live
/// reload client injected.
pub fn create_router(output_dir: &Path, state: Arc<ServerState>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload_handler))
        .fallback_service(ServeDir::new(output_dir))
        .layer(middleware::map_response(inject_livereload))
        .with_state(state)
}

/// Server-Sent Events handler for live reload.
async fn livereload_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.reload_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(ReloadMessage::Reload) => Some(Ok(Event::default().data("reload"))),
        Err(_) => None, // Ignore lagged messages
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text("ping"))
}

async fn inject_livereload(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));
    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer HTML response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Insert [`LIVERELOAD_SCRIPT`] before the last `</body>`, or append it.
pub fn inject_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(idx) => format!("{}{LIVERELOAD_SCRIPT}{}", &html[..idx], &html[idx..]),
        None => format!("{html}{LIVERELOAD_SCRIPT}"),
    }
}

/// JavaScript snippet to inject for live reload.
pub const LIVERELOAD_SCRIPT: &str = r#"<script>
(function() {
    const source = new EventSource('/__livereload');
    source.onmessage = function(event) {
        if (event.data === 'reload') {
            window.location.reload();
        }
    };
    source.onerror = function() {
        console.log('[livereload] Connection lost, retrying...');
    };
})();
</script>"#;

#[cfg(test)]
mod tests {
    use std::fs;

    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("index.html"), "<html><body><p>Hi</p></body></html>").expect("write html");
        fs::write(dir.path().join("fragment.html"), "<p>part</p>").expect("write fragment");
        fs::create_dir_all(dir.path().join("css")).expect("create css dir");
        fs::write(dir.path().join("css/styles.min.css"), "body{margin:0}").expect("write css");
        dir
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8(bytes.to_vec()).expect("utf-8"))
    }

    #[test]
    fn test_inject_script() {
        let html = inject_script("<body><p>x</p></body></html>");
        assert!(html.starts_with("<body><p>x</p><script>"));
        assert!(html.ends_with("</script></body></html>"));

        let bare = inject_script("<p>x</p>");
        assert!(bare.starts_with("<p>x</p><script>"));
    }

    #[tokio::test]
    async fn test_html_gets_reload_script() {
        let dir = site();
        let router = create_router(dir.path(), Arc::new(ServerState::new()));

        let (status, body) = get_body(router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("new EventSource('/__livereload')"));
        assert!(body.ends_with("</script></body></html>"));
    }

    #[tokio::test]
    async fn test_html_without_body_tag() {
        let dir = site();
        let router = create_router(dir.path(), Arc::new(ServerState::new()));

        let (_, body) = get_body(router, "/fragment.html").await;
        assert!(body.starts_with("<p>part</p><script>"));
    }

    #[tokio::test]
    async fn test_css_untouched() {
        let dir = site();
        let router = create_router(dir.path(), Arc::new(ServerState::new()));

        let (status, body) = get_body(router, "/css/styles.min.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body{margin:0}");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = site();
        let router = create_router(dir.path(), Arc::new(ServerState::new()));

        let (status, body) = get_body(router, "/nope.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.contains("__livereload"));
    }

    #[test]
    fn test_notify_reload_counts_clients() {
        let state = ServerState::new();
        assert_eq!(state.notify_reload(), 0);

        let mut rx = state.reload_tx.subscribe();
        assert_eq!(state.notify_reload(), 1);
        assert_eq!(rx.try_recv().expect("message"), ReloadMessage::Reload);
    }
}

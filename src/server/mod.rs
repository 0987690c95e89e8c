// src/server/mod.rs

//! Development HTTP server.
//!
//! Serves the `app` directory, injects a small live-reload client into
//! every HTML page and streams reload signals over server-sent events:
//!
//! - `GET /__sitepipe/events`: SSE stream with `reload` and `css` events
//! - `GET /__sitepipe/livereload.js`: the client script
//! - everything else: static files, directories resolve to `index.html`

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod reload;

pub use reload::{ReloadHub, ReloadSignal};

pub const EVENTS_PATH: &str = "/__sitepipe/events";
pub const CLIENT_PATH: &str = "/__sitepipe/livereload.js";

pub const CLIENT_TAG: &str = "<script src=\"/__sitepipe/livereload.js\"></script>";

const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource("/__sitepipe/events");
  source.addEventListener("reload", function () {
    window.location.reload();
  });
  source.addEventListener("css", function () {
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
      var url = new URL(link.href);
      url.searchParams.set("sitepipe", Date.now().toString());
      link.href = url.toString();
    });
  });
})();
"#;

#[derive(Clone)]
struct ServerState {
    hub: ReloadHub,
    /// Flips to `true` when the server starts shutting down, so that open
    /// event streams end and graceful shutdown can complete.
    stopping: watch::Receiver<bool>,
}

/// A bound, not yet running, dev server.
pub struct DevServer {
    listener: TcpListener,
    app_dir: PathBuf,
    hub: ReloadHub,
}

impl DevServer {
    /// Bind `addr` (`host:port`; port 0 picks a free one).
    pub async fn bind(addr: &str, app_dir: PathBuf, hub: ReloadHub) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            app_dir,
            hub,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves, then drain connections.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let router = router(self.app_dir.clone(), self.hub, stop_rx);

        info!(
            addr = %self.listener.local_addr()?,
            root = %self.app_dir.display(),
            "dev server listening"
        );

        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let _ = stop_tx.send(true);
            })
            .await
    }
}

fn router(app_dir: PathBuf, hub: ReloadHub, stopping: watch::Receiver<bool>) -> Router {
    let files = ServeDir::new(app_dir).append_index_html_on_directories(true);

    Router::new()
        .route(EVENTS_PATH, get(reload_events))
        .route(CLIENT_PATH, get(client_script))
        .fallback_service(files)
        .layer(middleware::map_response(inject_client))
        .layer(TraceLayer::new_for_http())
        .with_state(ServerState { hub, stopping })
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

async fn reload_events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    let mut stopping = state.stopping;
    let stop = async move {
        let _ = stopping.wait_for(|stopping| *stopping).await;
    };

    let events = stream::unfold(state.hub.subscribe(), |mut receiver| async move {
        match receiver.recv().await {
            Ok(signal) => {
                let event = Event::default()
                    .event(signal.kind.event_name())
                    .data(signal.reason);
                Some((Ok(event), receiver))
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "reload stream lagged, skipping signals");
                Some((
                    Ok(Event::default().comment(format!("skipped {n} signals"))),
                    receiver,
                ))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(events.take_until(stop)).keep_alive(KeepAlive::default())
}

/// Add the live-reload client to successful HTML responses.
async fn inject_client(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));

    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
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

/// Insert the client `<script>` tag before the last `</body>`, or append it
/// when the page has no body end tag.
pub fn inject_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + CLIENT_TAG.len());
            out.push_str(&html[..at]);
            out.push_str(CLIENT_TAG);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{CLIENT_TAG}"),
    }
}

//! An in-process HTTP fixture server for the scenario tests.
//!
//! A random-port `TcpListener`, `axum::serve(...).with_graceful_shutdown(...)`,
//! and a `oneshot` channel fired on `Drop`. Serves a fixed in-memory map of
//! path -> (status, body), since the scenarios need to construct
//! manifest/`.jsonl` bytes directly rather than read them from a fixture
//! directory on disk.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;

pub struct FixtureServer {
    local_addr: SocketAddr,
    shutdown_sender: Option<oneshot::Sender<()>>,
}

impl FixtureServer {
    /// Root URL the scenarios should pass as `SyncConfig::base_url`.
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}/", self.local_addr.port())).unwrap()
    }

    pub async fn start(routes: HashMap<String, (StatusCode, Vec<u8>)>) -> Self {
        let routes: Arc<HashMap<String, (StatusCode, Vec<u8>)>> = Arc::new(routes);
        let app = Router::new()
            .fallback(serve_fixture)
            .with_state(routes);

        let addr = SocketAddr::new([127, 0, 0, 1].into(), 0);
        let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
        let local_addr = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel();
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            rx.await.ok();
        });
        tokio::spawn(server.into_future());

        Self {
            local_addr,
            shutdown_sender: Some(tx),
        }
    }
}

async fn serve_fixture(
    State(routes): State<Arc<HashMap<String, (StatusCode, Vec<u8>)>>>,
    uri: Uri,
) -> impl IntoResponse {
    match routes.get(uri.path()) {
        Some((status, body)) => (*status, body.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Vec::new()).into_response(),
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_sender.take() {
            let _ = tx.send(());
        }
    }
}

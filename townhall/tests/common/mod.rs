#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;
use townhall::hub::BroadcastHub;
use townhall::message::ServerEvent;
use townhall::sync_notifier::{Disabled, Notifier};
use townhall::MutationService;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn service(dir: &Path) -> Arc<MutationService> {
    service_with(dir, Arc::new(Disabled), false).await
}

pub async fn service_with(
    dir: &Path,
    notifier: Arc<dyn Notifier>,
    strict: bool,
) -> Arc<MutationService> {
    Arc::new(MutationService::open(dir, BroadcastHub::new(16), notifier, strict).await)
}

pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    match body {
        Some(body) => send(app, method, uri, Some("application/json"), body.to_string()).await,
        None => send(app, method, uri, None, String::new()).await,
    }
}

/// Like [`request`] but with a raw body and an optional `content-type`.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: String,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let request = builder.body(Body::from(body)).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn connect(addr: std::net::SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    ws
}

/// Next server event, skipping control frames.
pub async fn next_event(ws: &mut Client) -> ServerEvent {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct StubReply {
    pub status: u16,
    pub body: Value,
    pub delay: Duration,
}

impl StubReply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub modality: String,
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: usize,
}

/// Stand-in for the analysis service. Replies are keyed by uploaded file name.
#[derive(Clone, Default)]
pub struct StubService {
    replies: Arc<Mutex<HashMap<String, StubReply>>>,
    received: Arc<Mutex<Vec<ReceivedUpload>>>,
}

impl StubService {
    pub fn reply(&self, file_name: &str, reply: StubReply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .insert(file_name.to_string(), reply);
        self
    }

    pub fn received(&self) -> Vec<ReceivedUpload> {
        self.received.lock().unwrap().clone()
    }

    /// Serves on an ephemeral port and returns the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/api/analyze/{modality}", post(analyze))
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

async fn analyze(
    State(service): State<StubService>,
    Path(modality): Path<String>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap_or_default();
        upload = Some(ReceivedUpload {
            modality: modality.clone(),
            field: name,
            file_name,
            content_type,
            size_bytes: data.len(),
        });
    }

    let Some(upload) = upload.filter(|u| u.field == "image") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No image file provided" })),
        );
    };

    let reply = service
        .replies
        .lock()
        .unwrap()
        .get(&upload.file_name)
        .cloned()
        .unwrap_or_else(|| StubReply::ok(json!({ "result": "Negative", "confidence": 0.5 })));
    service.received.lock().unwrap().push(upload);

    tokio::time::sleep(reply.delay).await;
    (
        StatusCode::from_u16(reply.status).unwrap(),
        Json(reply.body),
    )
}

/// An address nothing listens on.
pub async fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn png_bytes() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
}

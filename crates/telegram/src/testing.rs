//! In-process stand-in for the Telegram Bot API.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{StatusCode, Uri},
        response::{IntoResponse, Response},
        routing::any,
    },
    serde_json::{Value, json},
    teloxide::Bot,
    tokio::{sync::oneshot, task::JoinHandle},
};

const TOKEN: &str = "test-token";

/// A request the bot made against the mock.
#[derive(Debug, Clone)]
pub(crate) struct ApiCall {
    /// Bot API method (`SendMessage`, ...) or `download` for file fetches.
    pub method: String,
    pub raw: String,
}

impl ApiCall {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.raw).unwrap_or(Value::Null)
    }
}

#[derive(Clone, Default)]
struct MockState {
    calls: Arc<Mutex<Vec<ApiCall>>>,
    updates: Arc<Mutex<VecDeque<Value>>>,
    file: Option<(String, Vec<u8>)>,
    omit_file_size: bool,
    fail_all: bool,
    conflict_on_updates: bool,
    rate_limits: Arc<AtomicUsize>,
}

pub(crate) struct MockTelegramApi {
    addr: SocketAddr,
    state: MockState,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl MockTelegramApi {
    pub async fn start() -> Self {
        Self::serve(MockState::default()).await
    }

    /// Every API call answers "chat not found".
    pub async fn start_failing() -> Self {
        Self::serve(MockState {
            fail_all: true,
            ..Default::default()
        })
        .await
    }

    /// The first `count` API calls answer 429 with `retry_after: 1`.
    pub async fn start_rate_limited(count: usize) -> Self {
        Self::serve(MockState {
            rate_limits: Arc::new(AtomicUsize::new(count)),
            ..Default::default()
        })
        .await
    }

    /// `getFile` resolves to `path`, whose download returns `data`.
    pub async fn start_with_file(path: &str, data: &[u8]) -> Self {
        Self::serve(MockState {
            file: Some((path.to_string(), data.to_vec())),
            ..Default::default()
        })
        .await
    }

    /// Like [`Self::start_with_file`], but `getFile` leaves out `file_size`.
    pub async fn start_with_unsized_file(path: &str, data: &[u8]) -> Self {
        Self::serve(MockState {
            file: Some((path.to_string(), data.to_vec())),
            omit_file_size: true,
            ..Default::default()
        })
        .await
    }

    /// `getUpdates` always fails with a conflict.
    pub async fn start_conflicting() -> Self {
        Self::serve(MockState {
            conflict_on_updates: true,
            ..Default::default()
        })
        .await
    }

    async fn serve(state: MockState) -> Self {
        let app = Router::new()
            .route("/{*path}", any(telegram_api_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        Self {
            addr,
            state,
            shutdown_tx,
            server,
        }
    }

    pub fn bot(&self) -> Bot {
        let api_url = reqwest::Url::parse(&format!("http://{}/", self.addr)).expect("parse api url");
        Bot::new(TOKEN).set_api_url(api_url)
    }

    /// Queue updates for the next `getUpdates` call.
    pub fn push_updates(&self, updates: impl IntoIterator<Item = Value>) {
        self.state
            .updates
            .lock()
            .expect("updates lock")
            .extend(updates);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Poll until `method` has been called, for up to five seconds.
    pub async fn wait_for(&self, method: &str) -> Vec<ApiCall> {
        for _ in 0..100 {
            let calls = self.calls_to(method);
            if !calls.is_empty() {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("no {method} call within 5s, calls={:?}", self.calls());
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        self.server.await.expect("server join");
    }
}

fn ok(result: Value) -> Response {
    Json(json!({ "ok": true, "result": result })).into_response()
}

fn message_result() -> Value {
    json!({
        "message_id": 1,
        "date": 0,
        "chat": { "id": 42, "type": "private", "first_name": "Alice" },
        "text": "ok"
    })
}

async fn telegram_api_handler(State(state): State<MockState>, uri: Uri, body: Bytes) -> Response {
    let path = uri.path();

    if let Some(file_path) = path.strip_prefix(&format!("/file/bot{TOKEN}/")) {
        state.calls.lock().expect("calls lock").push(ApiCall {
            method: "download".into(),
            raw: file_path.to_string(),
        });
        return match &state.file {
            Some((known, data)) if known == file_path => data.clone().into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        };
    }

    let method = path.rsplit('/').next().unwrap_or_default().to_string();
    state.calls.lock().expect("calls lock").push(ApiCall {
        method: method.clone(),
        raw: String::from_utf8_lossy(&body).to_string(),
    });

    if state.fail_all {
        return Json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        }))
        .into_response();
    }

    if state
        .rate_limits
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return Json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 1",
            "parameters": { "retry_after": 1 }
        }))
        .into_response();
    }

    match method.as_str() {
        "GetMe" => ok(json!({
            "id": 777,
            "is_bot": true,
            "first_name": "Voxrelay",
            "username": "voxrelay_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        })),
        "GetUpdates" if state.conflict_on_updates => Json(json!({
            "ok": false,
            "error_code": 409,
            "description": "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running"
        }))
        .into_response(),
        "GetUpdates" => {
            let batch: Vec<Value> = state
                .updates
                .lock()
                .expect("updates lock")
                .drain(..)
                .collect();
            if batch.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            ok(Value::Array(batch))
        },
        "GetFile" => match &state.file {
            Some((file_path, data)) => {
                let mut file = json!({
                    "file_id": "file-1",
                    "file_unique_id": "file-1-u",
                    "file_path": file_path
                });
                if !state.omit_file_size {
                    file["file_size"] = json!(data.len());
                }
                ok(file)
            },
            None => Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: no such file in mock"
            }))
            .into_response(),
        },
        "SendMessage" | "SendAudio" => ok(message_result()),
        _ => ok(json!(true)),
    }
}

//! Fake provider servers for the client tests.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub type Log = Arc<Mutex<Vec<Recorded>>>;

/// Serve `respond(method, path)` on an ephemeral port; returns the base URL
/// and the log of received requests.
pub async fn fake<F>(respond: F) -> (String, Log)
where
    F: Fn(&str, &str) -> (u16, Value) + Clone + Send + Sync + 'static,
{
    let log: Log = Arc::default();
    let seen = log.clone();
    let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: String| {
        let seen = seen.clone();
        let respond = respond.clone();
        async move {
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            seen.lock().unwrap().push(Recorded {
                method: method.to_string(),
                path: uri.path().to_string(),
                query: uri.query().map(str::to_string),
                authorization: header("authorization"),
                content_type: header("content-type"),
                body,
            });
            let (status, value) = respond(method.as_str(), uri.path());
            (StatusCode::from_u16(status).unwrap(), axum::Json(value)).into_response()
        }
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), log)
}

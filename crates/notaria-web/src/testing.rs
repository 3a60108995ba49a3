//! End-to-end harness: the full router on an ephemeral port, driven with
//! reqwest and a hand-carried session cookie.

use std::sync::{Arc, Mutex};

use notaria_core::{Matter, MatterInput, MatterStatus, NewUser, Role, Settings, User};
use notaria_store::{Media, Store};
use reqwest::redirect::Policy;
use reqwest::{Response, header};
use tempfile::TempDir;

use crate::{AppState, router};

pub const PASSWORD: &str = "correct-horse";

/// A Gemini stand-in that answers every prompt with `reply`. Returns its base URL.
pub async fn fake_gemini(reply: &'static str) -> String {
    let body = serde_json::json!({"candidates": [{"content": {"parts": [{"text": reply}]}}]});
    let app = axum::Router::new().fallback(move || {
        let body = body.clone();
        async move { axum::Json(body) }
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub struct TestApp {
    pub base: String,
    pub state: AppState,
    _media: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut Settings)) -> Self {
        let media = TempDir::new().unwrap();
        let mut settings = Settings {
            media_root: media.path().to_path_buf(),
            ..Settings::default()
        };
        settings.gemini.base_url = "http://127.0.0.1:9".into();
        configure(&mut settings);
        let state = AppState::new(Store::open().unwrap(), Media::new(media.path()), settings);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base: format!("http://{addr}"),
            state,
            _media: media,
        }
    }

    pub fn user(&self, username: &str, role: Role) -> User {
        let store = self.state.db().unwrap();
        store
            .create_user(&NewUser::new(username, &format!("{username}@example.com"), PASSWORD, role))
            .unwrap()
    }

    pub fn admin(&self, username: &str) -> User {
        self.user(username, Role::Admin)
    }

    /// An open matter created by `owner`.
    pub fn matter(&self, title: &str, owner: i64) -> Matter {
        let input = MatterInput {
            title: title.into(),
            description: None,
            status: MatterStatus::Open,
            start_date: notaria_core::now().date(),
            due_date: None,
            completion_date: None,
            notes: None,
            client_ids: Vec::new(),
            assigned_user_ids: Vec::new(),
        };
        self.state.db().unwrap().create_matter(&input, Some(owner)).unwrap()
    }

    pub fn anonymous(&self) -> Browser {
        Browser {
            client: reqwest::Client::builder().redirect(Policy::none()).build().unwrap(),
            base: self.base.clone(),
            cookie: Arc::default(),
        }
    }

    pub async fn login(&self, username: &str) -> Browser {
        let browser = self.anonymous();
        let resp = browser
            .post_form("/accounts/login/", &[("username", username), ("password", PASSWORD)])
            .await;
        assert_eq!(Self::location(&resp), "/dashboard/", "login failed for {username}");
        browser
    }

    pub fn location(resp: &Response) -> String {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

pub struct Browser {
    client: reqwest::Client,
    base: String,
    cookie: Arc<Mutex<Option<String>>>,
}

impl Browser {
    fn keep_cookie(&self, resp: &Response) {
        if let Some(value) = resp.headers().get(header::SET_COOKIE).and_then(|v| v.to_str().ok()) {
            let pair = value.split(';').next().unwrap_or_default().to_string();
            *self.cookie.lock().unwrap() = Some(pair);
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base));
        if let Some(cookie) = self.cookie.lock().unwrap().clone() {
            req = req.header(header::COOKIE, cookie);
        }
        req
    }

    /// Value of the session cookie the browser currently holds.
    pub fn session_id(&self) -> Option<String> {
        let cookie = self.cookie.lock().unwrap().clone()?;
        let (_, value) = cookie.split_once('=')?;
        Some(value.to_string()).filter(|v| !v.is_empty())
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Response {
        let resp = req.send().await.unwrap();
        self.keep_cookie(&resp);
        resp
    }

    pub async fn get(&self, path: &str) -> Response {
        self.send(self.request(reqwest::Method::GET, path)).await
    }

    pub async fn page(&self, path: &str) -> String {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK, "GET {path}");
        resp.text().await.unwrap()
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Response {
        self.send(self.request(reqwest::Method::POST, path).form(fields)).await
    }

    /// POST, follow the redirect, return the resulting page.
    pub async fn post_and_follow(&self, path: &str, fields: &[(&str, &str)]) -> String {
        let resp = self.post_form(path, fields).await;
        let to = TestApp::location(&resp);
        assert!(!to.is_empty(), "POST {path} did not redirect: {}", resp.status());
        self.page(&to).await
    }

    pub async fn post_multipart(&self, path: &str, form: reqwest::multipart::Form) -> Response {
        self.send(self.request(reqwest::Method::POST, path).multipart(form)).await
    }

    pub async fn post_body(&self, path: &str, content_type: &str, body: &str) -> Response {
        self.send(
            self.request(reqwest::Method::POST, path)
                .header(header::CONTENT_TYPE, content_type)
                .body(body.to_string()),
        )
        .await
    }

    pub async fn request_raw(&self, method: reqwest::Method, path: &str) -> Response {
        self.send(self.request(method, path)).await
    }
}

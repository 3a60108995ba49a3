//! Server-side sessions keyed by the `notaria_session` cookie.
//!
//! A session carries the logged-in user, one-shot flash messages and the
//! pending Google OAuth state. Sessions live in memory and are lost on
//! restart. A session is only created once something is written to it, and
//! idle sessions are swept whenever a new one is created.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts, OriginalUri, Request, State};
use axum::http::header::{COOKIE, HOST, ORIGIN, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use notaria_core::User;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::AppState;
use crate::render::redirect;

pub const COOKIE_NAME: &str = "notaria_session";
pub const LOGIN_URL: &str = "/accounts/login/";

/// Sessions untouched for this long are dropped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(14 * 24 * 60 * 60);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn css_class(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: Level,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthPending {
    pub state: String,
    pub integration_id: i64,
}

#[derive(Debug)]
struct Session {
    user_id: Option<i64>,
    flashes: Vec<Flash>,
    oauth: Option<OAuthPending>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            user_id: None,
            flashes: Vec::new(),
            oauth: None,
            last_seen: Instant::now(),
        }
    }
}

/// All live sessions.
#[derive(Clone)]
pub struct Sessions {
    inner: Arc<Mutex<HashMap<String, Session>>>,
    idle_timeout: Duration,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::with_idle_timeout(IDLE_TIMEOUT)
    }
}

impl Sessions {
    fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::default(),
            idle_timeout,
        }
    }

    fn is_live(&self, session: &Session, now: Instant) -> bool {
        now.duration_since(session.last_seen) < self.idle_timeout
    }

    /// Run `f` on a live session and refresh its idle clock. An expired
    /// session is removed and `None` returned.
    fn get<T>(&self, id: &str, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut map = lock(&self.inner);
        let now = Instant::now();
        if !map.get(id).is_some_and(|s| self.is_live(s, now)) {
            map.remove(id);
            return None;
        }
        let session = map.get_mut(id)?;
        session.last_seen = now;
        Some(f(session))
    }

    /// Store a new session under a fresh id, sweeping idle ones first.
    fn insert(&self, session: Session) -> String {
        let mut map = lock(&self.inner);
        self.sweep_and_insert(&mut map, session, Instant::now())
    }

    fn sweep_and_insert(&self, map: &mut HashMap<String, Session>, mut session: Session, now: Instant) -> String {
        map.retain(|_, s| self.is_live(s, now));
        session.last_seen = now;
        let id = Uuid::new_v4().simple().to_string();
        map.insert(id.clone(), session);
        debug!(live = map.len(), "created session");
        id
    }

    /// Run `f` on the session `id`, creating one when it is missing or
    /// expired. Returns the id actually used.
    fn upsert<T>(&self, id: Option<&str>, f: impl FnOnce(&mut Session) -> T) -> (String, T) {
        let mut map = lock(&self.inner);
        let now = Instant::now();
        let live = id.filter(|id| map.get(*id).is_some_and(|s| self.is_live(s, now)));
        let id = match live {
            Some(id) => id.to_string(),
            None => {
                if let Some(stale) = id {
                    map.remove(stale);
                }
                self.sweep_and_insert(&mut map, Session::new(), now)
            }
        };
        let session = map.entry(id.clone()).or_insert_with(Session::new);
        session.last_seen = now;
        (id, f(session))
    }

    fn remove(&self, id: &str) -> Option<Session> {
        lock(&self.inner).remove(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.get(id, |_| ()).is_some()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.inner).len()
    }
}

/// Session id of the current request, shared by every [`SessionHandle`]
/// built for it. `None` until something is written.
#[derive(Debug, Clone)]
struct SessionId(Arc<Mutex<Option<String>>>);

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

/// Cross-site form posts are refused: when a browser sends `Origin`, its
/// host must match `Host`.
fn cross_origin(headers: &HeaderMap) -> bool {
    let (Some(origin), Some(host)) = (
        headers.get(ORIGIN).and_then(|v| v.to_str().ok()),
        headers.get(HOST).and_then(|v| v.to_str().ok()),
    ) else {
        return false;
    };
    let origin_host = origin.split_once("://").map(|(_, rest)| rest).unwrap_or(origin);
    origin != "null" && origin_host != host
}

/// Resolve the request's session from its cookie. After the handler runs,
/// a cookie is issued when the session id changed and cleared when the
/// session went away.
pub async fn session_layer(State(app): State<AppState>, mut req: Request, next: Next) -> Response {
    if req.method() == Method::POST && cross_origin(req.headers()) {
        warn!(uri = %req.uri(), "rejected cross-origin form post");
        return (StatusCode::FORBIDDEN, "CSRF verification failed.").into_response();
    }
    let presented = cookie_value(req.headers(), COOKIE_NAME);
    let known = presented.clone().filter(|id| app.sessions.contains(id));
    let slot = Arc::new(Mutex::new(known.clone()));
    req.extensions_mut().insert(SessionId(slot.clone()));

    let mut resp = next.run(req).await;

    let current = lock(&slot).clone();
    let cookie = match (&current, &presented) {
        (Some(id), _) if current != known => Some(format!("{COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax")),
        (None, Some(_)) => Some(format!("{COOKIE_NAME}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")),
        _ => None,
    };
    if let Some(cookie) = cookie
        && let Ok(value) = HeaderValue::from_str(&cookie)
    {
        resp.headers_mut().append(SET_COOKIE, value);
    }
    resp
}

/// Handle on the current request's session. Reads never create a session;
/// the first write does.
#[derive(Clone)]
pub struct SessionHandle {
    id: Arc<Mutex<Option<String>>>,
    sessions: Sessions,
}

impl SessionHandle {
    fn read<T>(&self, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let id = lock(&self.id).clone()?;
        self.sessions.get(&id, f)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut slot = lock(&self.id);
        let (id, out) = self.sessions.upsert(slot.as_deref(), f);
        *slot = Some(id);
        out
    }

    /// Drop the current session, returning its pending flashes.
    fn discard(&self, slot: &mut Option<String>) -> Vec<Flash> {
        slot.take()
            .and_then(|old| self.sessions.remove(&old))
            .map(|s| s.flashes)
            .unwrap_or_default()
    }

    pub fn flash(&self, level: Level, text: impl Into<String>) {
        let text = text.into();
        self.write(|s| s.flashes.push(Flash { level, text }));
    }

    pub fn success(&self, text: impl Into<String>) {
        self.flash(Level::Success, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.flash(Level::Info, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.flash(Level::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.flash(Level::Error, text);
    }

    pub fn take_flashes(&self) -> Vec<Flash> {
        self.read(|s| std::mem::take(&mut s.flashes)).unwrap_or_default()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.read(|s| s.user_id).flatten()
    }

    /// Start an authenticated session under a new id. Pending flashes carry over.
    pub fn log_in(&self, user_id: i64) {
        let mut slot = lock(&self.id);
        let flashes = self.discard(&mut slot);
        *slot = Some(self.sessions.insert(Session {
            user_id: Some(user_id),
            flashes,
            ..Session::new()
        }));
    }

    /// Remove the session. Pending flashes survive under a new id.
    pub fn log_out(&self) {
        let mut slot = lock(&self.id);
        let flashes = self.discard(&mut slot);
        if !flashes.is_empty() {
            *slot = Some(self.sessions.insert(Session {
                flashes,
                ..Session::new()
            }));
        }
    }

    pub fn begin_oauth(&self, pending: OAuthPending) {
        self.write(|s| s.oauth = Some(pending));
    }

    /// The pending OAuth state, consumed.
    pub fn take_oauth(&self) -> Option<OAuthPending> {
        self.read(|s| s.oauth.take()).flatten()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let id = parts
            .extensions
            .get::<SessionId>()
            .map(|s| Arc::clone(&s.0))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
        Ok(Self {
            id,
            sessions: app.sessions.clone(),
        })
    }
}

/// The logged-in, active user. Anonymous requests are redirected to the
/// login page with `?next=` set to the requested path.
pub struct CurrentUser {
    pub user: User,
    pub session: SessionHandle,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_privileged(&self) -> bool {
        self.user.is_privileged()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = SessionHandle::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let path = match parts.extensions.get::<OriginalUri>() {
            Some(uri) => uri.0.path().to_string(),
            None => parts.uri.path().to_string(),
        };
        let to_login = || redirect(&format!("{LOGIN_URL}?next={path}"));

        let Some(user_id) = session.user_id() else {
            return Err(to_login());
        };
        let app = AppState::from_ref(state);
        let user = {
            let store = app.db().map_err(IntoResponse::into_response)?;
            store.get_user(user_id)
        };
        match user {
            Ok(user) if user.is_active => Ok(Self { user, session }),
            Ok(_) => {
                session.log_out();
                Err(to_login())
            }
            Err(e) if e.is_not_found() => {
                session.log_out();
                Err(to_login())
            }
            Err(e) => Err(crate::AppError::from(e).into_response()),
        }
    }
}

/// Privileged users only; others go back to the dashboard.
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let me = CurrentUser::from_request_parts(parts, state).await?;
        if !me.is_privileged() {
            me.session
                .error("You do not have permission to access this page.");
            return Err(redirect("/dashboard/"));
        }
        Ok(Self(me))
    }
}

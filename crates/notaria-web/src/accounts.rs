//! Registration, login and logout.

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use notaria_core::account::registration_from_form;
use notaria_core::{FormData, Role};
use serde::Deserialize;
use tracing::{info, warn};

use crate::forms::{Posted, flash_errors};
use crate::render::{self, choices, escape, input, redirect, select};
use crate::session::SessionHandle;
use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/register/", get(register_page).post(register))
        .route("/accounts/login/", get(login_page).post(login))
        .route("/accounts/logout/", get(logout).post(logout))
}

fn anonymous_page(session: &SessionHandle, title: &str, body: &str) -> Response {
    let flashes = session.take_flashes();
    render::page(title, None, &flashes, body).into_response()
}

// ── Register ──

fn register_form(values: &FormData) -> String {
    let roles: Vec<(String, String)> = choices(Role::ALL, Role::as_str, Role::label)
        .into_iter()
        .filter(|(value, _)| value != Role::Admin.as_str())
        .collect();
    let fields = [
        input(values, "username", "Username", "text"),
        input(values, "email", "Email", "email"),
        select(values, "role", "Role", &roles, false),
        input(values, "password1", "Password", "password"),
        input(values, "password2", "Password confirmation", "password"),
    ]
    .concat();
    render::form("/accounts/register/", &fields, "Register")
}

async fn register_page(session: SessionHandle) -> Response {
    anonymous_page(&session, "Register", &register_form(&FormData::default()))
}

async fn register(State(app): State<AppState>, session: SessionHandle, Posted(form): Posted) -> Result<Response, AppError> {
    let new_user = match registration_from_form(&form) {
        Ok(u) => u,
        Err(errors) => {
            flash_errors(&session, &errors);
            return Ok(anonymous_page(&session, "Register", &register_form(&form)));
        }
    };
    let created = app.db()?.create_user(&new_user);
    match created {
        Ok(user) => {
            session.log_in(user.id);
            session.success("Registration successful. Welcome!");
            Ok(redirect("/dashboard/"))
        }
        Err(notaria_store::StoreError::Conflict(msg)) => {
            session.error(format!("Error in username: {msg}"));
            Ok(anonymous_page(&session, "Register", &register_form(&form)))
        }
        Err(e) => Err(e.into()),
    }
}

// ── Login ──

#[derive(Debug, Default, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

/// Only same-site paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") => n,
        _ => "/dashboard/",
    }
}

fn login_form(values: &FormData, next: &str) -> String {
    let fields = format!(
        "{}{}<input type=\"hidden\" name=\"next\" value=\"{}\">",
        input(values, "username", "Username", "text"),
        input(values, "password", "Password", "password"),
        escape(next)
    );
    render::form("/accounts/login/", &fields, "Log in")
}

async fn login_page(session: SessionHandle, Query(q): Query<NextQuery>) -> Response {
    let next = safe_next(q.next.as_deref()).to_string();
    anonymous_page(&session, "Log in", &login_form(&FormData::default(), &next))
}

async fn login(State(app): State<AppState>, session: SessionHandle, Posted(form): Posted) -> Result<Response, AppError> {
    let username = form.text("username").unwrap_or_default();
    let password = form.raw("password").unwrap_or_default();
    let next = safe_next(form.raw("next")).to_string();
    let user = app.db()?.authenticate(&username, password)?;
    match user {
        Some(user) => {
            info!(user_id = user.id, username = %user.username, "logged in");
            session.log_in(user.id);
            Ok(redirect(&next))
        }
        None => {
            warn!(username = %username, "failed login");
            session.error("Please enter a correct username and password. Note that both fields may be case-sensitive.");
            Ok(anonymous_page(&session, "Log in", &login_form(&form, &next)))
        }
    }
}

async fn logout(session: SessionHandle) -> Response {
    session.log_out();
    session.info("You have been logged out.");
    redirect("/")
}

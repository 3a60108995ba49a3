//! Integration administration: provider credentials, connection tests,
//! the Google OAuth consent flow and the integration log.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use notaria_core::integration::LogLevel;
use notaria_core::{FormData, Integration, IntegrationInput, IntegrationLog, ServiceName};
use serde::Deserialize;
use tracing::{info, warn};

use crate::forms::{Posted, flash_errors};
use crate::outbound;
use crate::render::{self, checkbox, choices, definition_list, escape, input, link, select, table, text};
use crate::session::{AdminUser, OAuthPending};
use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/integrations/", get(integration_list))
        .route("/integrations/create/", get(create_page).post(create))
        .route("/integrations/:id/config/", get(config_page).post(configure))
        .route("/integrations/:id/delete/", get(delete_page).post(delete))
        .route("/integrations/:id/test/", post(test_connection))
        .route("/integrations/:id/oauth/google/", get(google_authorize))
        .route("/integrations/oauth/google/callback/", get(google_callback))
}

const INTEGRATION_LIST: &str = "/integrations/";

fn config_url(id: i64) -> String {
    format!("/integrations/{id}/config/")
}

fn status_label(row: &Integration) -> &'static str {
    if row.is_enabled { "Enabled" } else { "Disabled" }
}

fn log_table(logs: &[IntegrationLog]) -> String {
    let rows = logs
        .iter()
        .map(|l| {
            let related = match (&l.related_object_type, &l.related_object_id) {
                (Some(kind), Some(id)) => escape(&format!("{kind} #{id}")),
                _ => "-".into(),
            };
            vec![
                render::timestamp(Some(l.timestamp)),
                l.level.label().into(),
                escape(&l.message),
                related,
            ]
        })
        .collect();
    table(&["Time", "Level", "Message", "Related"], rows, "No log entries.")
}

async fn integration_list(State(app): State<AppState>, AdminUser(me): AdminUser) -> Result<Response, AppError> {
    let (rows, logs) = {
        let store = app.db()?;
        (store.list_integrations()?, store.recent_logs(20)?)
    };
    let rows = rows
        .iter()
        .map(|row| {
            let account = match row.service_name {
                ServiceName::Gmail if row.has_google_tokens() => "Google account linked",
                ServiceName::Gmail => "Not linked",
                _ if row.api_key.is_some() => "API key stored",
                _ => "No API key",
            };
            vec![
                link(&config_url(row.id), row.service_name.label()),
                status_label(row).into(),
                account.into(),
            ]
        })
        .collect();
    let body = format!(
        "<p>{}</p>{}<h2>Recent activity</h2>{}",
        link("/integrations/create/", "Add integration"),
        table(&["Service", "Status", "Credentials"], rows, "No integrations configured."),
        log_table(&logs),
    );
    Ok(me.render("Integrations", &body))
}

// ── Create ──

fn create_form(values: &FormData) -> String {
    let services = choices(ServiceName::ALL, ServiceName::as_str, ServiceName::label);
    let fields = [
        select(values, "service_name", "Service", &services, true),
        checkbox(values, "is_enabled", "Enabled"),
        input(values, "api_key", "API key", "password"),
        input(values, "api_secret", "API secret", "password"),
    ]
    .concat();
    render::form("/integrations/create/", &fields, "Create")
}

async fn create_page(AdminUser(me): AdminUser) -> Response {
    me.render("Add Integration", &create_form(&FormData::default()))
}

async fn create(State(app): State<AppState>, AdminUser(me): AdminUser, Posted(form): Posted) -> Result<Response, AppError> {
    let input = match IntegrationInput::from_form(&form) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return Ok(me.render("Add Integration", &create_form(&form)));
        }
    };
    let created = app.db()?.create_integration(&input);
    match created {
        Ok(row) => {
            me.session
                .success(format!("Integration \"{}\" created.", row.service_name.label()));
            Ok(render::redirect(&config_url(row.id)))
        }
        Err(notaria_store::StoreError::Conflict(message)) => {
            me.session.error(format!("Error in service_name: {message}"));
            Ok(me.render("Add Integration", &create_form(&form)))
        }
        Err(e) => Err(e.into()),
    }
}

// ── Configure ──

fn config_form(row: &Integration, values: &FormData) -> String {
    let mut fields = checkbox(values, "is_enabled", "Enabled");
    if row.service_name != ServiceName::Gmail {
        fields.push_str(&input(values, "api_key", "API key (leave blank to keep the stored key)", "password"));
        fields.push_str(&input(
            values,
            "api_secret",
            "API secret (leave blank to keep the stored secret)",
            "password",
        ));
    }
    render::form(&config_url(row.id), &fields, "Save")
}

fn config_body(app: &AppState, row: &Integration, values: &FormData) -> Result<String, AppError> {
    let logs = app.db()?.integration_logs(row.id, 50)?;
    let mut details = vec![
        ("Service", escape(row.service_name.label())),
        ("Status", status_label(row).into()),
    ];
    let mut actions = vec![render::action(&format!("/integrations/{}/test/", row.id), "Test connection")];
    if row.service_name == ServiceName::Gmail {
        details.push(("Token expires", render::timestamp(row.google_token_expires_at)));
        details.push(("Scopes", text(row.google_token_scope.as_deref())));
        let label = if row.has_google_tokens() { "Reconnect Google account" } else { "Connect Google account" };
        actions.push(link(&format!("/integrations/{}/oauth/google/", row.id), label));
    }
    actions.push(link(&format!("/integrations/{}/delete/", row.id), "Delete"));
    actions.push(link(INTEGRATION_LIST, "Back to integrations"));
    Ok(format!(
        "{}{}<p>{}</p><h2>Log</h2>{}",
        definition_list(&details),
        config_form(row, values),
        actions.join(" "),
        log_table(&logs),
    ))
}

async fn config_page(State(app): State<AppState>, AdminUser(me): AdminUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let row = app.db()?.get_integration(id)?;
    let mut values = FormData::default();
    if row.is_enabled {
        values.push("is_enabled", "on");
    }
    let body = config_body(&app, &row, &values)?;
    Ok(me.render(&format!("{} Integration", row.service_name.label()), &body))
}

async fn configure(
    State(app): State<AppState>,
    AdminUser(me): AdminUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let row = app.db()?.get_integration(id)?;
    let input = IntegrationInput {
        service_name: row.service_name,
        is_enabled: form.flag("is_enabled"),
        api_key: form.text("api_key"),
        api_secret: form.text("api_secret"),
    };
    let updated = app.db()?.update_integration(id, &input)?;
    info!(integration_id = id, enabled = updated.is_enabled, "integration reconfigured");
    me.session.success(format!(
        "Integration \"{}\" updated successfully!",
        updated.service_name.label()
    ));
    Ok(render::redirect(&config_url(id)))
}

// ── Delete ──

async fn delete_page(State(app): State<AppState>, AdminUser(me): AdminUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let row = app.db()?.get_integration(id)?;
    let body = format!(
        "<p>Delete the {} integration and its log?</p>{} {}",
        escape(row.service_name.label()),
        render::action(&format!("/integrations/{id}/delete/"), "Yes, delete"),
        link(&config_url(id), "Cancel"),
    );
    Ok(me.render("Delete Integration", &body))
}

async fn delete(State(app): State<AppState>, AdminUser(me): AdminUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let service = {
        let mut store = app.db()?;
        let row = store.get_integration(id)?;
        store.delete_integration(id)?;
        row.service_name
    };
    me.session
        .success(format!("Integration \"{}\" deleted.", service.label()));
    Ok(render::redirect(INTEGRATION_LIST))
}

// ── Connection test ──

async fn probe(app: &AppState, service: ServiceName) -> Result<String, AppError> {
    match service {
        ServiceName::Credas => Ok(outbound::credas(app)?.test_connection().await?),
        ServiceName::PepsSanctions => Ok(outbound::sanctions(app)?.test_connection().await?),
        ServiceName::Zoom => Ok(outbound::zoom(app)?.test_connection().await?),
        ServiceName::Gmail => {
            let client = outbound::gmail(app)?;
            let token = outbound::gmail_token(app, &client).await?;
            let email = client.profile(&token).await?;
            Ok(format!("Connected as {email}."))
        }
    }
}

async fn test_connection(State(app): State<AppState>, AdminUser(me): AdminUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let row = app.db()?.get_integration(id)?;
    let service = row.service_name;
    match probe(&app, service).await {
        Ok(message) => {
            outbound::log_event(&app, service, LogLevel::Info, format!("Connection test succeeded: {message}"), None)?;
            me.session.success(message);
        }
        Err(AppError::Integration(e)) => {
            outbound::log_event(&app, service, LogLevel::Error, format!("Connection test failed: {e}"), None)?;
            me.session.error(format!("Connection test failed: {e}"));
        }
        Err(e) => return Err(e),
    }
    Ok(render::redirect(&config_url(id)))
}

// ── Google OAuth ──

async fn google_authorize(State(app): State<AppState>, AdminUser(me): AdminUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let row = app.db()?.get_integration(id)?;
    if row.service_name != ServiceName::Gmail {
        me.session
            .warning("Only the Gmail integration connects a Google account.");
        return Ok(render::redirect(&config_url(id)));
    }
    let state = uuid::Uuid::new_v4().simple().to_string();
    let url = match outbound::gmail(&app) {
        Ok(client) => client.authorization_url(&state).map_err(AppError::from),
        Err(e) => Err(e),
    };
    let url = match url {
        Ok(url) => url,
        Err(AppError::Integration(e)) => {
            me.session.error(format!("Cannot start Google authorization: {e}"));
            return Ok(render::redirect(&config_url(id)));
        }
        Err(e) => return Err(e),
    };
    me.session.begin_oauth(OAuthPending {
        state,
        integration_id: id,
    });
    info!(integration_id = id, "redirecting to google consent");
    Ok(render::redirect(&url))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn google_callback(
    State(app): State<AppState>,
    AdminUser(me): AdminUser,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let pending = me.session.take_oauth();
    let Some(pending) = pending.filter(|p| query.state.as_deref() == Some(p.state.as_str())) else {
        warn!("google callback with unknown state");
        me.session
            .error("Invalid OAuth state. Please start the authorization again.");
        return Ok(render::redirect(INTEGRATION_LIST));
    };
    let back = config_url(pending.integration_id);
    if let Some(error) = query.error {
        outbound::log_event(&app, ServiceName::Gmail, LogLevel::Warning, format!("Google authorization denied: {error}"), None)?;
        me.session.error(format!("Google authorization failed: {error}"));
        return Ok(render::redirect(&back));
    }
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        me.session
            .error("Google did not return an authorization code.");
        return Ok(render::redirect(&back));
    };

    let exchanged = match outbound::gmail(&app) {
        Ok(client) => client
            .exchange_code(&code, notaria_core::now())
            .await
            .map_err(AppError::from),
        Err(e) => Err(e),
    };
    match exchanged {
        Ok(tokens) => {
            app.db()?.save_google_tokens(&tokens)?;
            outbound::log_event(&app, ServiceName::Gmail, LogLevel::Info, "Google account linked", None)?;
            me.session.success("Gmail account connected successfully.");
        }
        Err(AppError::Integration(e)) => {
            outbound::log_event(&app, ServiceName::Gmail, LogLevel::Error, format!("Token exchange failed: {e}"), None)?;
            me.session
                .error(format!("Could not complete Google authorization: {e}"));
        }
        Err(e) => return Err(e),
    }
    Ok(render::redirect(&back))
}

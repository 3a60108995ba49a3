//! Provider clients built from settings plus the stored integration rows,
//! and the integration log.
//!
//! Provider failures come back as [`AppError::Integration`] so handlers can
//! turn them into flash messages while store failures still propagate.

use notaria_core::integration::LogLevel;
use notaria_core::{NewLogEntry, ServiceName};
use notaria_integrations::zoom::{Meeting, MeetingRequest};
use notaria_integrations::{CredasClient, GmailClient, IntegrationError, SanctionsClient, Subject, ZoomClient};
use tracing::{error, info};

use crate::{AppError, AppState};

pub fn credas(app: &AppState) -> Result<CredasClient, AppError> {
    let row = app.integration(ServiceName::Credas)?;
    let settings = app.settings.credas.with_integration(row.as_ref());
    Ok(CredasClient::new(&settings, app.settings.http_timeout)?)
}

pub fn sanctions(app: &AppState) -> Result<SanctionsClient, AppError> {
    let row = app.integration(ServiceName::PepsSanctions)?;
    let settings = app.settings.peps_sanctions.with_integration(row.as_ref());
    Ok(SanctionsClient::new(&settings, app.settings.http_timeout)?)
}

pub fn zoom(app: &AppState) -> Result<ZoomClient, AppError> {
    let row = app.integration(ServiceName::Zoom)?;
    let settings = app.settings.zoom.with_integration(row.as_ref());
    Ok(ZoomClient::new(&settings, app.settings.http_timeout)?)
}

pub fn gmail(app: &AppState) -> Result<GmailClient, AppError> {
    Ok(GmailClient::new(&app.settings.google, app.settings.http_timeout)?)
}

/// A usable Gmail access token from the linked account. Refreshed tokens
/// are written back before returning.
pub async fn gmail_token(app: &AppState, client: &GmailClient) -> Result<String, AppError> {
    let row = app
        .integration(ServiceName::Gmail)?
        .filter(|row| row.is_enabled && row.has_google_tokens())
        .ok_or(IntegrationError::NotConfigured("Gmail"))?;
    let token = client.access_token(&row, notaria_core::now()).await?;
    if let Some(tokens) = &token.refreshed {
        app.db()?.save_google_tokens(tokens)?;
    }
    Ok(token.token)
}

/// Send an HTML email through the linked Gmail account.
pub async fn send_email(app: &AppState, to: &[String], subject: &str, body_html: &str) -> Result<String, AppError> {
    let client = gmail(app)?;
    let token = gmail_token(app, &client).await?;
    Ok(client.send(&token, to, subject, body_html).await?)
}

/// Submit `subject` to a verification provider; returns the provider's
/// reference for the check.
pub async fn submit_verification(app: &AppState, service: ServiceName, subject: &Subject) -> Result<String, AppError> {
    match service {
        ServiceName::Credas => Ok(credas(app)?.submit_check(subject).await?.reference),
        ServiceName::PepsSanctions => {
            let screening = sanctions(app)?.search(subject).await?;
            info!(reference = %screening.reference, match_found = screening.match_found, "sanctions screening submitted");
            Ok(screening.reference)
        }
        other => Err(AppError::BadRequest(format!("{} does not run verification checks", other.label()))),
    }
}

pub async fn schedule_meeting(app: &AppState, request: &MeetingRequest) -> Result<Meeting, AppError> {
    Ok(zoom(app)?.create_meeting(request).await?)
}

/// Write an integration log row for `service`, attached to its
/// configuration row when there is one.
pub fn log_event(
    app: &AppState,
    service: ServiceName,
    level: LogLevel,
    message: impl Into<String>,
    about: Option<(&str, i64)>,
) -> Result<(), AppError> {
    let message = message.into();
    match level {
        LogLevel::Error => error!(service = %service, "{message}"),
        _ => info!(service = %service, "{message}"),
    }
    let store = app.db()?;
    let integration_id = store.integration_for(service)?.map(|row| row.id);
    let mut entry = NewLogEntry::new(level, message).for_integration(integration_id);
    if let Some((kind, id)) = about {
        entry = entry.about(kind, id);
    }
    store.log_integration_event(&entry)?;
    Ok(())
}

//! Integration configuration, Google OAuth tokens and the integration log.

use duckdb::{OptionalExt, Row, params};
use notaria_core::{
    Integration, IntegrationInput, IntegrationLog, NewLogEntry, OAuthTokens, ServiceName,
};
use tracing::{debug, info};

use crate::error::ConstraintExt;
use crate::store::{fmt_opt_ts, fmt_ts, opt_ts, parsed, ts};
use crate::{Store, StoreError};

pub const DUPLICATE_SERVICE: &str = "An integration for this service already exists.";

const COLUMNS: &str = "id, service_name, is_enabled, api_key, api_secret, google_access_token, \
                       google_refresh_token, google_token_expires_at, google_token_scope";
const LOG_COLUMNS: &str =
    "id, integration_id, level, message, logged_at, related_object_type, related_object_id";

fn read_integration(row: &Row<'_>) -> duckdb::Result<Integration> {
    Ok(Integration {
        id: row.get(0)?,
        service_name: parsed(row, 1)?,
        is_enabled: row.get(2)?,
        api_key: row.get(3)?,
        api_secret: row.get(4)?,
        google_access_token: row.get(5)?,
        google_refresh_token: row.get(6)?,
        google_token_expires_at: opt_ts(row, 7)?,
        google_token_scope: row.get(8)?,
    })
}

fn read_log(row: &Row<'_>) -> duckdb::Result<IntegrationLog> {
    Ok(IntegrationLog {
        id: row.get(0)?,
        integration_id: row.get(1)?,
        level: parsed(row, 2)?,
        message: row.get(3)?,
        timestamp: ts(row, 4)?,
        related_object_type: row.get(5)?,
        related_object_id: row.get(6)?,
    })
}

impl Store {
    pub fn create_integration(&self, input: &IntegrationInput) -> Result<Integration, StoreError> {
        let id: i64 = self
            .conn
            .query_row(
                "INSERT INTO integrations (service_name, is_enabled, api_key, api_secret) \
                 VALUES (?, ?, ?, ?) RETURNING id",
                params![input.service_name.as_str(), input.is_enabled, input.api_key, input.api_secret],
                |row| row.get(0),
            )
            .on_conflict(DUPLICATE_SERVICE)?;
        info!(integration_id = id, service = %input.service_name, "created integration");
        self.get_integration(id)
    }

    /// Update configuration. The service itself is fixed once created and a
    /// blank key or secret keeps the stored one.
    pub fn update_integration(&self, id: i64, input: &IntegrationInput) -> Result<Integration, StoreError> {
        let current = self.get_integration(id)?;
        if current.service_name != input.service_name {
            return Err(StoreError::InvalidValue(
                "The service of an existing integration cannot be changed.".into(),
            ));
        }
        let api_key = input.api_key.clone().or(current.api_key);
        let api_secret = input.api_secret.clone().or(current.api_secret);
        self.conn.execute(
            "UPDATE integrations SET is_enabled = ?, api_key = ?, api_secret = ? WHERE id = ?",
            params![input.is_enabled, api_key, api_secret, id],
        )?;
        info!(integration_id = id, enabled = input.is_enabled, "updated integration");
        self.get_integration(id)
    }

    pub fn get_integration(&self, id: i64) -> Result<Integration, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM integrations WHERE id = ?"),
                [id],
                read_integration,
            )
            .optional()?
            .ok_or(StoreError::not_found("integration", id))
    }

    pub fn integration_for(&self, service: ServiceName) -> Result<Option<Integration>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM integrations WHERE service_name = ?"),
                [service.as_str()],
                read_integration,
            )
            .optional()?)
    }

    pub fn list_integrations(&self) -> Result<Vec<Integration>, StoreError> {
        self.query_list(
            &format!("SELECT {COLUMNS} FROM integrations ORDER BY service_name"),
            &[],
            read_integration,
        )
    }

    /// Delete an integration together with its log rows.
    pub fn delete_integration(&mut self, id: i64) -> Result<(), StoreError> {
        self.get_integration(id)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM integration_logs WHERE integration_id = ?", [id])?;
        tx.execute("DELETE FROM integrations WHERE id = ?", [id])?;
        tx.commit()?;
        info!(integration_id = id, "deleted integration");
        Ok(())
    }

    /// Persist Google tokens on the Gmail integration, creating and enabling
    /// it as needed. A missing refresh token keeps the stored one.
    pub fn save_google_tokens(&self, tokens: &OAuthTokens) -> Result<Integration, StoreError> {
        let row = match self.integration_for(ServiceName::Gmail)? {
            Some(row) => row,
            None => self.create_integration(&IntegrationInput {
                service_name: ServiceName::Gmail,
                is_enabled: true,
                api_key: None,
                api_secret: None,
            })?,
        };
        let refresh = tokens.refresh_token.clone().or(row.google_refresh_token);
        let scope = tokens.scope.clone().or(row.google_token_scope);
        self.conn.execute(
            "UPDATE integrations SET is_enabled = true, google_access_token = ?, \
             google_refresh_token = ?, google_token_expires_at = ?, google_token_scope = ? \
             WHERE id = ?",
            params![tokens.access_token, refresh, fmt_opt_ts(tokens.expires_at), scope, row.id],
        )?;
        info!(integration_id = row.id, expires_at = ?tokens.expires_at, "stored google tokens");
        self.get_integration(row.id)
    }

    // ── Log ──

    pub fn log_integration_event(&self, entry: &NewLogEntry) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO integration_logs (integration_id, level, message, logged_at, \
             related_object_type, related_object_id) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.integration_id,
                entry.level.as_str(),
                entry.message,
                fmt_ts(notaria_core::now()),
                entry.related_object_type,
                entry.related_object_id,
            ],
        )?;
        debug!(level = %entry.level, "integration event: {}", entry.message);
        Ok(())
    }

    /// Newest first.
    pub fn integration_logs(&self, integration_id: i64, limit: usize) -> Result<Vec<IntegrationLog>, StoreError> {
        let limit = limit as i64;
        self.query_list(
            &format!(
                "SELECT {LOG_COLUMNS} FROM integration_logs WHERE integration_id = ? \
                 ORDER BY logged_at DESC, id DESC LIMIT ?"
            ),
            &[&integration_id, &limit],
            read_log,
        )
    }

    pub fn recent_logs(&self, limit: usize) -> Result<Vec<IntegrationLog>, StoreError> {
        let limit = limit as i64;
        self.query_list(
            &format!("SELECT {LOG_COLUMNS} FROM integration_logs ORDER BY logged_at DESC, id DESC LIMIT ?"),
            &[&limit],
            read_log,
        )
    }
}

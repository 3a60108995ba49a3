//! Third-party service configuration and the integration log.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::forms::{self, FormData, FormErrors};

string_enum! {
    pub enum ServiceName {
        Credas => ("credas", "Credas"),
        PepsSanctions => ("peps_sanctions", "PEPs & Sanctions"),
        Zoom => ("zoom", "Zoom"),
        Gmail => ("gmail", "Gmail"),
    }
}

string_enum! {
    pub enum LogLevel {
        Info => ("INFO", "Info"),
        Warning => ("WARNING", "Warning"),
        Error => ("ERROR", "Error"),
        Debug => ("DEBUG", "Debug"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: i64,
    pub service_name: ServiceName,
    pub is_enabled: bool,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    pub api_secret: Option<String>,
    #[serde(skip_serializing)]
    pub google_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub google_refresh_token: Option<String>,
    pub google_token_expires_at: Option<NaiveDateTime>,
    pub google_token_scope: Option<String>,
}

impl Integration {
    /// Refresh a minute early so a token never expires mid-request.
    pub fn google_token_expired(&self, now: NaiveDateTime) -> bool {
        match self.google_token_expires_at {
            Some(at) => at - Duration::seconds(60) <= now,
            None => true,
        }
    }

    pub fn has_google_tokens(&self) -> bool {
        self.google_access_token.is_some() || self.google_refresh_token.is_some()
    }
}

/// Admin configuration form. Blank key/secret on edit keeps the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationInput {
    pub service_name: ServiceName,
    pub is_enabled: bool,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl IntegrationInput {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let service_name = match form.text("service_name") {
            None => {
                errors.add("service_name", "This field is required.");
                ServiceName::Credas
            }
            Some(_) => forms::choice(form, "service_name", ServiceName::Credas, &mut errors),
        };
        let input = Self {
            service_name,
            is_enabled: form.flag("is_enabled"),
            api_key: form.text("api_key"),
            api_secret: form.text("api_secret"),
        };
        errors.into_result(input)
    }
}

/// Tokens returned by the Google token endpoint, already resolved to an
/// absolute expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthTokens {
    pub access_token: String,
    /// Google only returns it on the first consent; keep the old one otherwise.
    pub refresh_token: Option<String>,
    pub expires_at: Option<NaiveDateTime>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationLog {
    pub id: i64,
    pub integration_id: Option<i64>,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: NaiveDateTime,
    pub related_object_type: Option<String>,
    pub related_object_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub integration_id: Option<i64>,
    pub level: LogLevel,
    pub message: String,
    pub related_object_type: Option<String>,
    pub related_object_id: Option<String>,
}

impl NewLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            integration_id: None,
            level,
            message: message.into(),
            related_object_type: None,
            related_object_id: None,
        }
    }

    pub fn for_integration(mut self, integration_id: Option<i64>) -> Self {
        self.integration_id = integration_id;
        self
    }

    pub fn about(mut self, object_type: &str, object_id: impl ToString) -> Self {
        self.related_object_type = Some(object_type.to_string());
        self.related_object_id = Some(object_id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn gmail(expires_at: Option<NaiveDateTime>) -> Integration {
        Integration {
            id: 1,
            service_name: ServiceName::Gmail,
            is_enabled: true,
            api_key: None,
            api_secret: None,
            google_access_token: Some("tok".into()),
            google_refresh_token: Some("ref".into()),
            google_token_expires_at: expires_at,
            google_token_scope: None,
        }
    }

    #[test]
    fn token_expiry_has_margin() {
        assert!(!gmail(Some(at(10, 5))).google_token_expired(at(10, 0)));
        assert!(gmail(Some(at(10, 0))).google_token_expired(at(9, 59) + Duration::seconds(30)));
        assert!(gmail(None).google_token_expired(at(10, 0)));
    }

    #[test]
    fn service_names_use_stored_values() {
        assert_eq!(ServiceName::PepsSanctions.as_str(), "peps_sanctions");
        assert_eq!("gmail".parse::<ServiceName>().unwrap(), ServiceName::Gmail);
        assert_eq!(LogLevel::Warning.to_string(), "WARNING");
    }

    #[test]
    fn form_requires_service() {
        let errors = IntegrationInput::from_form(&FormData::default()).unwrap_err();
        assert!(errors.has("service_name"));
        let input = IntegrationInput::from_form(&FormData::from_slice(&[
            ("service_name", "zoom"),
            ("is_enabled", "on"),
            ("api_key", "k"),
        ]))
        .unwrap();
        assert_eq!(input.service_name, ServiceName::Zoom);
        assert!(input.is_enabled);
        assert_eq!(input.api_secret, None);
    }

    #[test]
    fn log_entry_builder() {
        let e = NewLogEntry::new(LogLevel::Error, "boom").for_integration(Some(4)).about("ComplianceCheck", 9);
        assert_eq!(e.integration_id, Some(4));
        assert_eq!(e.related_object_id.as_deref(), Some("9"));
    }
}

//! Runtime settings, filled from flags and environment by the binary.

use std::path::PathBuf;
use std::time::Duration;

use crate::integration::Integration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub media_root: PathBuf,
    pub bind: String,
    pub http_timeout: Duration,
    pub gemini: GeminiSettings,
    pub credas: ProviderSettings,
    pub peps_sanctions: ProviderSettings,
    pub zoom: ZoomSettings,
    pub google: GoogleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("notaria.duckdb"),
            media_root: PathBuf::from("media"),
            bind: "127.0.0.1:8000".into(),
            http_timeout: Duration::from_secs(30),
            gemini: GeminiSettings::default(),
            credas: ProviderSettings::new("https://api.credas.com"),
            peps_sanctions: ProviderSettings::new("https://api.peps-sanctions-provider.com"),
            zoom: ZoomSettings::default(),
            google: GoogleSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-pro".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
        }
    }
}

/// Key-authenticated provider (Credas, sanctions screening).
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub base_url: String,
}

impl ProviderSettings {
    pub fn new(base_url: &str) -> Self {
        Self {
            api_key: None,
            api_secret: None,
            base_url: base_url.into(),
        }
    }

    /// Credentials from an enabled integration row win over the environment.
    pub fn with_integration(&self, integration: Option<&Integration>) -> Self {
        match integration {
            Some(row) if row.is_enabled && row.api_key.is_some() => Self {
                api_key: row.api_key.clone(),
                api_secret: row.api_secret.clone(),
                base_url: self.base_url.clone(),
            },
            _ => self.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoomSettings {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub account_id: Option<String>,
    pub base_url: String,
    pub oauth_base_url: String,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            account_id: None,
            base_url: "https://api.zoom.us".into(),
            oauth_base_url: "https://zoom.us".into(),
        }
    }
}

impl ZoomSettings {
    pub fn with_integration(&self, integration: Option<&Integration>) -> Self {
        match integration {
            Some(row) if row.is_enabled && row.api_key.is_some() => Self {
                api_key: row.api_key.clone(),
                api_secret: row.api_secret.clone(),
                ..self.clone()
            },
            _ => self.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://localhost:8000/integrations/oauth/google/callback/".into(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            api_base_url: "https://gmail.googleapis.com".into(),
        }
    }
}

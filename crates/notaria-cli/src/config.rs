//! Command-line flags with environment fallbacks, folded into [`Settings`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use notaria_core::Settings;

#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// DuckDB database file
    #[arg(long, env = "NOTARIA_DB", default_value = "notaria.duckdb")]
    pub db: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Root directory for uploaded files
    #[arg(long, env = "NOTARIA_MEDIA_ROOT", default_value = "media")]
    pub media_root: PathBuf,

    /// Listen address
    #[arg(long, env = "NOTARIA_BIND", default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// Timeout for outbound provider calls, in seconds
    #[arg(long, env = "NOTARIA_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_MODEL")]
    pub gemini_model: Option<String>,
    #[arg(long, env = "GEMINI_BASE_URL")]
    pub gemini_base_url: Option<String>,

    #[arg(long, env = "CREDAS_API_KEY", hide_env_values = true)]
    pub credas_api_key: Option<String>,
    #[arg(long, env = "CREDAS_BASE_URL")]
    pub credas_base_url: Option<String>,

    #[arg(long, env = "PEPS_SANCTIONS_API_KEY", hide_env_values = true)]
    pub peps_sanctions_api_key: Option<String>,
    #[arg(long, env = "PEPS_SANCTIONS_BASE_URL")]
    pub peps_sanctions_base_url: Option<String>,

    #[arg(long, env = "ZOOM_API_KEY", hide_env_values = true)]
    pub zoom_api_key: Option<String>,
    #[arg(long, env = "ZOOM_API_SECRET", hide_env_values = true)]
    pub zoom_api_secret: Option<String>,
    #[arg(long, env = "ZOOM_ACCOUNT_ID")]
    pub zoom_account_id: Option<String>,

    #[arg(long, env = "GOOGLE_OAUTH_CLIENT_ID")]
    pub google_client_id: Option<String>,
    #[arg(long, env = "GOOGLE_OAUTH_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,
    #[arg(long, env = "GOOGLE_OAUTH_REDIRECT_URI")]
    pub google_redirect_uri: Option<String>,
}

impl ServeArgs {
    /// Defaults from [`Settings::default`], overridden by whatever was given.
    pub fn settings(&self) -> Settings {
        let mut s = Settings {
            database: self.db.db.clone(),
            media_root: self.media_root.clone(),
            bind: self.bind.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            ..Settings::default()
        };

        s.gemini.api_key = self.gemini_api_key.clone();
        if let Some(model) = &self.gemini_model {
            s.gemini.model = model.clone();
        }
        if let Some(url) = &self.gemini_base_url {
            s.gemini.base_url = url.clone();
        }

        s.credas.api_key = self.credas_api_key.clone();
        if let Some(url) = &self.credas_base_url {
            s.credas.base_url = url.clone();
        }
        s.peps_sanctions.api_key = self.peps_sanctions_api_key.clone();
        if let Some(url) = &self.peps_sanctions_base_url {
            s.peps_sanctions.base_url = url.clone();
        }

        s.zoom.api_key = self.zoom_api_key.clone();
        s.zoom.api_secret = self.zoom_api_secret.clone();
        s.zoom.account_id = self.zoom_account_id.clone();

        s.google.client_id = self.google_client_id.clone();
        s.google.client_secret = self.google_client_secret.clone();
        if let Some(uri) = &self.google_redirect_uri {
            s.google.redirect_uri = uri.clone();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn flags_override_defaults() {
        let h = Harness::parse_from([
            "notaria",
            "--db",
            "/tmp/x.duckdb",
            "--gemini-model",
            "gemini-1.5-flash",
            "--credas-base-url",
            "http://localhost:9000",
            "--http-timeout-secs",
            "5",
        ]);
        let s = h.serve.settings();
        assert_eq!(s.database, PathBuf::from("/tmp/x.duckdb"));
        assert_eq!(s.gemini.model, "gemini-1.5-flash");
        assert_eq!(s.credas.base_url, "http://localhost:9000");
        assert_eq!(s.http_timeout, Duration::from_secs(5));
        assert_eq!(s.google.redirect_uri, Settings::default().google.redirect_uri);
    }
}

//! Process configuration. Read once at startup and then passed around
//! read-only; nothing here is global.

use crate::error::{Error, Result};
use crate::preset::Preset;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the model service credential
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "helmet-check.toml";

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "helmet_check=info,actix_web=info";

/// Largest accepted upload (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Sessions untouched for this long are dropped (30 minutes)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// Upper bound on the time between two expiry sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct ModelSettings {
    /// Base URL of an OpenAI-compatible service
    pub endpoint: String,

    /// Model identifier sent with every request
    pub name: String,

    /// No timeout is applied when unset
    pub timeout_secs: Option<u64>,

    pub api_key: String,
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ModelSettings {{ endpoint: {:?}, name: {:?}, timeout_secs: {:?}, api_key: <redacted> }}",
            self.endpoint, self.name, self.timeout_secs
        )
    }
}

impl ModelSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Idle time after which a session and its image are discarded
    pub ttl_secs: u64,
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// How often to look for expired sessions
    pub fn sweep_interval(&self) -> Duration {
        self.ttl().min(MAX_SWEEP_INTERVAL)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub upload: UploadSettings,
    pub session: SessionSettings,
    pub preset: Preset,
}

impl Settings {
    /// Load `.env`, then the settings from `path` (or the default config file
    /// if it exists), `HELMET_*` environment variables and `OPENAI_API_KEY`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let api_key = std::env::var(API_KEY_VAR).ok();
        let env = Environment::with_prefix("HELMET")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::build(path, None, Some(env), api_key)
    }

    /// Build settings from an explicit TOML string and credential, without
    /// consulting the process environment
    pub fn from_toml(toml: &str, api_key: Option<String>) -> Result<Self> {
        Self::build(None, Some(toml), None, api_key)
    }

    fn build(
        path: Option<&Path>,
        toml: Option<&str>,
        env: Option<Environment>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("model.endpoint", "https://api.openai.com")?
            .set_default("model.name", "gpt-4o-mini")?
            .set_default("upload.max_bytes", DEFAULT_MAX_UPLOAD_BYTES as i64)?
            .set_default("session.ttl_secs", DEFAULT_SESSION_TTL_SECS as i64)?
            .set_default("preset", "generic")?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        if let Some(toml) = toml {
            builder = builder.add_source(File::from_str(toml, FileFormat::Toml));
        }
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        // The credential must be present and non-empty before anything
        // touches the network
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::Config(format!("{API_KEY_VAR} is not set")))?;
        builder = builder.set_override("model.api_key", api_key)?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(Error::Config("model.name must not be empty".into()));
        }
        if !self.model.endpoint.starts_with("http://") && !self.model.endpoint.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "model.endpoint must be an http(s) URL, got {:?}",
                self.model.endpoint
            )));
        }
        if self.upload.max_bytes == 0 {
            return Err(Error::Config("upload.max_bytes must be positive".into()));
        }
        if self.session.ttl_secs == 0 {
            return Err(Error::Config("session.ttl_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

//! Configuration for the panelink client.
//!
//! One TOML file plus `PANELINK_*` environment overrides, merged with
//! `figment`, then translated into the settings types `panelink-api` and
//! `panelink-core` expect. Nested keys use a double underscore in the
//! environment: `PANELINK_SERVER__ORIGIN`, `PANELINK_REALTIME__COOLDOWN_SECS`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use panelink_api::{RuntimeCredential, TlsMode, TransportConfig};
use panelink_core::{CachePolicy, CacheRoute, RealtimeConfig, ReconcileMode, ReconnectConfig};

const ENV_PREFIX: &str = "PANELINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    /// Login used for both the HTTP API and the realtime channel.
    #[serde(default)]
    pub credentials: Option<CredentialSection>,

    #[serde(default)]
    pub realtime: RealtimeSection,

    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// Panel origin, e.g. "https://panel.example.com".
    pub origin: Option<String>,

    /// Explicit realtime endpoint. Derived from `origin` when unset.
    pub endpoint: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Accept self-signed certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            origin: None,
            endpoint: None,
            timeout_secs: default_timeout(),
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialSection {
    pub principal: String,

    /// Plaintext secret. Prefer `secret_env`.
    pub secret: Option<String>,

    /// Environment variable holding the secret.
    pub secret_env: Option<String>,

    /// One-time second-factor code.
    pub second_factor: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeSection {
    pub base_interval_ms: u64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
    pub max_exponent: u32,
    pub cooldown_threshold: u32,
    pub cooldown_secs: u64,
    pub auth_reject_code: u16,
    /// `0` disables keepalive pings.
    pub keepalive_secs: u64,
    /// Unsubscribe from channels as soon as they leave the desired set.
    pub strict_unsubscribe: bool,
    /// Channels to subscribe to on connect.
    pub channels: Vec<String>,
}

impl Default for RealtimeSection {
    fn default() -> Self {
        let d = ReconnectConfig::default();
        Self {
            base_interval_ms: millis(d.base_interval),
            max_delay_ms: millis(d.max_delay),
            max_jitter_ms: millis(d.max_jitter),
            max_exponent: d.max_exponent,
            cooldown_threshold: d.cooldown_threshold,
            cooldown_secs: d.cooldown.as_secs(),
            auth_reject_code: d.auth_reject_code,
            keepalive_secs: d.keepalive.map_or(0, |k| k.as_secs()),
            strict_unsubscribe: false,
            channels: Vec::new(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    pub default_ttl_secs: u64,
    /// Replaces the built-in route table when set.
    pub routes: Option<Vec<RouteEntry>>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: CachePolicy::default().default_ttl.as_secs(),
            routes: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    pub pattern: String,
    pub ttl_secs: u64,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "panelink", "panelink").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("panelink");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` (or the platform path) plus environment.
///
/// A missing file is not an error; defaults and environment still apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Conversions ─────────────────────────────────────────────────────

impl Config {
    /// The panel origin as a URL.
    pub fn origin(&self) -> Result<Url, ConfigError> {
        let raw = self
            .server
            .origin
            .as_deref()
            .ok_or_else(|| invalid("server.origin", "not set"))?;
        Url::parse(raw).map_err(|e| invalid("server.origin", format!("{raw}: {e}")))
    }

    /// The explicit realtime endpoint, if one is configured.
    pub fn endpoint(&self) -> Result<Option<Url>, ConfigError> {
        self.server
            .endpoint
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| invalid("server.endpoint", format!("{raw}: {e}")))
            })
            .transpose()
    }

    pub fn transport_config(&self) -> TransportConfig {
        let tls = if self.server.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.server.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.server.timeout_secs),
        }
    }

    /// Resolve the credential. `secret_env` wins over a plaintext `secret`.
    pub fn credential(&self) -> Result<Option<RuntimeCredential>, ConfigError> {
        let Some(ref section) = self.credentials else {
            return Ok(None);
        };

        let from_env = section
            .secret_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok());
        let secret = from_env
            .or_else(|| section.secret.clone())
            .ok_or_else(|| invalid("credentials.secret", "no secret or secret_env configured"))?;

        let mut credential = RuntimeCredential::new(section.principal.clone(), secret);
        if let Some(ref code) = section.second_factor {
            credential = credential.with_second_factor(code.clone());
        }
        Ok(Some(credential))
    }

    pub fn reconnect_config(&self) -> Result<ReconnectConfig, ConfigError> {
        let r = &self.realtime;
        if r.base_interval_ms == 0 {
            return Err(invalid("realtime.base_interval_ms", "must be greater than 0"));
        }
        if r.max_delay_ms < r.base_interval_ms {
            return Err(invalid(
                "realtime.max_delay_ms",
                "must not be below base_interval_ms",
            ));
        }
        if r.cooldown_threshold == 0 {
            return Err(invalid("realtime.cooldown_threshold", "must be at least 1"));
        }

        Ok(ReconnectConfig {
            base_interval: Duration::from_millis(r.base_interval_ms),
            max_delay: Duration::from_millis(r.max_delay_ms),
            max_jitter: Duration::from_millis(r.max_jitter_ms),
            max_exponent: r.max_exponent,
            cooldown_threshold: r.cooldown_threshold,
            cooldown: Duration::from_secs(r.cooldown_secs),
            auth_reject_code: r.auth_reject_code,
            keepalive: (r.keepalive_secs > 0).then(|| Duration::from_secs(r.keepalive_secs)),
        })
    }

    pub fn reconcile_mode(&self) -> ReconcileMode {
        if self.realtime.strict_unsubscribe {
            ReconcileMode::Strict
        } else {
            ReconcileMode::SubscribeOnly
        }
    }

    pub fn realtime_config(&self) -> Result<RealtimeConfig, ConfigError> {
        Ok(RealtimeConfig {
            reconnect: self.reconnect_config()?,
            reconcile: self.reconcile_mode(),
        })
    }

    pub fn cache_policy(&self) -> CachePolicy {
        let defaults = CachePolicy::default();
        let routes = self.cache.routes.as_ref().map_or(defaults.routes, |routes| {
            routes
                .iter()
                .map(|r| CacheRoute::new(r.pattern.clone(), Duration::from_secs(r.ttl_secs)))
                .collect()
        });
        CachePolicy {
            enabled: self.cache.enabled,
            routes,
            default_ttl: Duration::from_secs(self.cache.default_ttl_secs),
        }
    }
}

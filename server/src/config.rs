//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `LASTSEEN_LISTEN`, `LASTSEEN_TOKEN`,
//!    `LASTSEEN_STATE_FILE`, `LASTSEEN_OVERPASS_URL`, `LASTSEEN_HIDDEN_ZONES`
//! 2. **Config file** — path via `--config <path>`, or `lastseen.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8787"
//!
//! [logging]
//! level = "info"
//!
//! [auth]
//! token = "your-secret-token"      # omit to leave location routes open
//!
//! [store]
//! path = "/var/lib/lastseen/state.json"   # omit for in-memory state
//!
//! [overpass]
//! url = "https://overpass-api.de/api/interpreter"
//! radius_m = 500
//! max_results = 5
//! query_timeout_secs = 25
//! # connect_timeout_secs = 10            # default: no client-side limit
//! # request_timeout_secs = 30            # default: no client-side limit
//! max_label_distance_km = 0.2
//! system_proxy = true
//!
//! [[zones]]
//! name = "Home"
//! lat = 48.8566
//! lon = 2.3522
//! radius = 1.0    # km
//! ```
//!
//! `LASTSEEN_HIDDEN_ZONES` holds a JSON array of the same zone objects and
//! replaces any `[[zones]]` from the file. Zones are parsed once here and
//! never re-read while the server runs.

use serde::Deserialize;
use std::path::Path;

use crate::geo::HiddenZone;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "lastseen.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub overpass: OverpassConfig,
    /// Hidden zones, checked in list order.
    #[serde(default)]
    pub zones: Vec<HiddenZone>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8787`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Bearer token required on location routes. Override with `LASTSEEN_TOKEN`.
    /// `None` leaves the routes unauthenticated.
    pub token: Option<String>,
}

/// Persistence settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// JSON state file. `None` keeps state in memory only.
    pub path: Option<String>,
}

/// Overpass lookup settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassConfig {
    /// Interpreter endpoint (default public overpass-api.de instance).
    #[serde(default = "default_overpass_url")]
    pub url: String,
    /// Search radius around the reported point, in meters (default 500).
    #[serde(default = "default_radius_m")]
    pub radius_m: u32,
    /// Number of closest features kept (default 5).
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Server-side `[timeout:..]` in the query (default 25).
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Client-side connect timeout. `None` (default) leaves it to the OS.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Client-side whole-request timeout. `None` (default) applies none.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Nearest feature must be this close to be used as the label (default 0.2).
    #[serde(default = "default_max_label_distance_km")]
    pub max_label_distance_km: f64,
    /// Honor `HTTPS_PROXY`/`HTTP_PROXY` from the environment (default true).
    #[serde(default = "default_system_proxy")]
    pub system_proxy: bool,
}

fn default_listen() -> String {
    "0.0.0.0:8787".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}
fn default_radius_m() -> u32 {
    500
}
fn default_max_results() -> usize {
    5
}
fn default_query_timeout_secs() -> u64 {
    25
}
fn default_max_label_distance_km() -> f64 {
    0.2
}
fn default_system_proxy() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            url: default_overpass_url(),
            radius_m: default_radius_m(),
            max_results: default_max_results(),
            query_timeout_secs: default_query_timeout_secs(),
            connect_timeout_secs: None,
            request_timeout_secs: None,
            max_label_distance_km: default_max_label_distance_km(),
            system_proxy: default_system_proxy(),
        }
    }
}

/// Configuration could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Read { path: String, source: std::io::Error },
    /// The config file is not valid TOML for [`Config`].
    Parse { path: String, message: String },
    /// `LASTSEEN_HIDDEN_ZONES` is not a JSON array of zones.
    Zones(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config file {path}: {source}")
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Failed to parse config file {path}: {message}")
            }
            ConfigError::Zones(msg) => write!(f, "Invalid LASTSEEN_HIDDEN_ZONES: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a JSON array of `{name, lat, lon, radius}` objects.
pub fn parse_hidden_zones(json: &str) -> Result<Vec<HiddenZone>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Zones(e.to_string()))
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `lastseen.toml` in
    /// the current directory is used when present.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Config::default(),
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("LASTSEEN_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(token) = std::env::var("LASTSEEN_TOKEN") {
            config.auth.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Ok(state_file) = std::env::var("LASTSEEN_STATE_FILE") {
            config.store.path = Some(state_file).filter(|p| !p.is_empty());
        }
        if let Ok(url) = std::env::var("LASTSEEN_OVERPASS_URL") {
            config.overpass.url = url;
        }
        if let Ok(zones) = std::env::var("LASTSEEN_HIDDEN_ZONES") {
            config.zones = parse_hidden_zones(&zones)?;
        }

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.to_string(),
            message,
        })
    }

    /// Parse a TOML document; missing sections take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

//! Process-wide configuration.
//!
//! Settings are resolved once at startup from three layers, lowest precedence
//! first: built-in defaults, a dotenv file, and the process environment. The
//! resulting [`Settings`] value is immutable and shared by every transport.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::allowlist::DomainAllowlist;
use crate::{GatewayError, Result};

const DEFAULT_DOTENV: &str = ".env";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Timeouts applied to the shared upstream HTTP client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HttpTimeouts {
    /// TCP/TLS connection establishment.
    pub connect: Duration,
    /// Waiting for response bytes.
    pub read: Duration,
    /// Sending the request.
    pub write: Duration,
    /// Waiting for a pooled connection.
    pub pool: Duration,
}

impl HttpTimeouts {
    /// Upper bound for a whole request, used as reqwest's total timeout.
    pub fn total(&self) -> Duration {
        self.connect + self.pool + self.write + self.read
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(20),
            write: Duration::from_secs(10),
            pool: Duration::from_secs(5),
        }
    }
}

/// Logging switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Emit one line per search call.
    pub queries: bool,
    /// Include the raw query text in that line.
    pub query_text: bool,
    /// Filter directive, e.g. `info` or `search_gateway=debug`.
    pub level: String,
    /// Write logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            queries: false,
            query_text: false,
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Origins allowed by the CORS layer of the network transports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsOrigins {
    /// Any origin (`*`).
    #[default]
    Any,
    /// Exactly these origins.
    List(Vec<String>),
}

impl CorsOrigins {
    /// Parses `*` or a comma-separated origin list.
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return Self::Any;
        }
        Self::List(split_list(raw))
    }
}

/// Immutable process configuration.
#[derive(Clone)]
pub struct Settings {
    /// Upstream API key. Never echoed or logged.
    pub api_key: String,
    /// Search collection id (`cx`).
    pub cx: String,
    /// Optional result domain allowlist.
    pub allowlist: Option<DomainAllowlist>,
    /// Logging switches.
    pub log: LogSettings,
    /// Upstream client timeouts.
    pub timeouts: HttpTimeouts,
    /// CORS origins for network transports.
    pub cors_origins: CorsOrigins,
    /// Bind host for network transports.
    pub host: String,
    /// Bind port for network transports.
    pub port: u16,
}

impl Settings {
    /// Creates settings with the given credentials and defaults elsewhere.
    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            cx: cx.into(),
            allowlist: None,
            log: LogSettings::default(),
            timeouts: HttpTimeouts::default(),
            cors_origins: CorsOrigins::Any,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }

    /// Sets the result domain allowlist.
    pub fn with_allowlist(mut self, allowlist: DomainAllowlist) -> Self {
        self.allowlist = Some(allowlist);
        self
    }

    /// Sets the logging switches.
    pub fn with_log(mut self, log: LogSettings) -> Self {
        self.log = log;
        self
    }

    /// Sets the upstream client timeouts.
    pub fn with_timeouts(mut self, timeouts: HttpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Resolves settings from the dotenv file and the process environment.
    ///
    /// `env_file` takes priority over `DOTENV_PATH` (or its older name
    /// `DYNACONF_DOTENV_PATH`), which takes priority over `./.env`. An
    /// explicitly named file must exist; the default one may not.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let path = dotenv_location(env_file, |key| env::var_os(key));
        Self::from_sources(path.as_deref(), env::vars())
    }

    /// Resolves settings from an optional dotenv file overlaid by `vars`.
    pub fn from_sources<I>(dotenv: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = HashMap::new();
        if let Some(path) = dotenv {
            let iter = dotenvy::from_path_iter(path).map_err(|e| {
                GatewayError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            for item in iter {
                let (key, value) = item.map_err(|e| {
                    GatewayError::Config(format!("cannot parse {}: {}", path.display(), e))
                })?;
                merged.insert(key, value);
            }
        }
        merged.extend(vars);
        Self::from_map(&merged)
    }

    /// Builds settings from already merged key/value pairs.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("GOOGLE_API_KEY")
            .ok_or_else(|| GatewayError::Config("GOOGLE_API_KEY is not set".to_string()))?;
        let cx = get("GOOGLE_CX")
            .ok_or_else(|| GatewayError::Config("GOOGLE_CX is not set".to_string()))?;

        let log = LogSettings {
            queries: get("GOOGLE_LOG_QUERIES").is_some_and(parse_flag),
            query_text: get("GOOGLE_LOG_QUERY_TEXT").is_some_and(parse_flag),
            level: get("GOOGLE_LOG_LEVEL")
                .unwrap_or(DEFAULT_LOG_LEVEL)
                .to_lowercase(),
            file: get("GOOGLE_LOG_FILE").map(PathBuf::from),
        };

        let defaults = HttpTimeouts::default();
        let timeouts = HttpTimeouts {
            connect: parse_seconds(get("GOOGLE_CONNECT_TIMEOUT"), "GOOGLE_CONNECT_TIMEOUT", defaults.connect)?,
            read: parse_seconds(get("GOOGLE_READ_TIMEOUT"), "GOOGLE_READ_TIMEOUT", defaults.read)?,
            write: parse_seconds(get("GOOGLE_WRITE_TIMEOUT"), "GOOGLE_WRITE_TIMEOUT", defaults.write)?,
            pool: parse_seconds(get("GOOGLE_POOL_TIMEOUT"), "GOOGLE_POOL_TIMEOUT", defaults.pool)?,
        };

        Ok(Self {
            api_key: api_key.to_string(),
            cx: cx.to_string(),
            allowlist: get("GOOGLE_ALLOWED_DOMAINS").and_then(DomainAllowlist::parse),
            log,
            timeouts,
            cors_origins: get("CORS_ORIGINS").map(CorsOrigins::parse).unwrap_or_default(),
            host: get("HOST").unwrap_or(DEFAULT_HOST).to_string(),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("cx", &self.cx)
            .field("allowlist", &self.allowlist)
            .field("log", &self.log)
            .field("timeouts", &self.timeouts)
            .field("cors_origins", &self.cors_origins)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Environment variables naming the dotenv file, in priority order.
const DOTENV_PATH_KEYS: [&str; 2] = ["DOTENV_PATH", "DYNACONF_DOTENV_PATH"];

/// Picks the dotenv file to read, or `None` when the default is absent.
fn dotenv_location<F>(env_file: Option<&Path>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(path) = env_file {
        return Some(path.to_path_buf());
    }
    if let Some(path) = DOTENV_PATH_KEYS
        .iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.is_empty())
    {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_DOTENV);
    default.exists().then_some(default)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_seconds(raw: Option<&str>, key: &str, default: Duration) -> Result<Duration> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        _ => Err(GatewayError::Config(format!(
            "{} must be a positive number of seconds, got {:?}",
            key, raw
        ))),
    }
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

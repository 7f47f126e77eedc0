use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use runcast_core::relay::{RelayConfig, DEFAULT_BACKLOG_LIMIT, DEFAULT_JOB_RETENTION};

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
#[error("{key} has an invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Origins allowed by the CORS layer.
#[derive(Debug, Clone)]
pub enum CorsOrigins {
    /// `*`: any origin, without credentials.
    Any,
    /// Explicit list of origins, credentials allowed.
    List(Vec<HeaderValue>),
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `9542`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: CorsOrigins,
    /// HTTP request timeout in seconds (default: `30`). Streaming bodies are
    /// not subject to it once headers are sent.
    pub request_timeout_secs: u64,
    /// Directory holding the front-end bundle (default: `public`).
    pub static_dir: PathBuf,
    /// Interval of SSE keep-alive comments; `None` disables them.
    pub sse_keep_alive: Option<Duration>,
    /// How the external executable is launched.
    pub relay: RelayConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default          |
    /// |------------------------|------------------|
    /// | `HOST`                 | `0.0.0.0`        |
    /// | `PORT`                 | `9542`           |
    /// | `CORS_ORIGINS`         | `*`              |
    /// | `REQUEST_TIMEOUT_SECS` | `30`             |
    /// | `STATIC_DIR`           | `public`         |
    /// | `SSE_KEEP_ALIVE_SECS`  | `15` (0 = off)   |
    /// | `RELAY_EXECUTABLE`     | `./bin/runner`   |
    /// | `RELAY_WORKING_DIR`    | unset            |
    /// | `EXEC_TIMEOUT_SECS`    | unset            |
    /// | `KILL_ON_DISCONNECT`   | `false`          |
    /// | `JOB_RETENTION_SECS`   | `300`            |
    /// | `JOB_BACKLOG_LIMIT`    | `10000`          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or("PORT", var("PORT"), 9542u16)?;
        let cors_origins = parse_cors_origins(var("CORS_ORIGINS").as_deref().unwrap_or("*"))?;
        let request_timeout_secs = parse_or("REQUEST_TIMEOUT_SECS", var("REQUEST_TIMEOUT_SECS"), 30u64)?;
        let static_dir = PathBuf::from(var("STATIC_DIR").unwrap_or_else(|| "public".into()));

        let keep_alive_secs = parse_or("SSE_KEEP_ALIVE_SECS", var("SSE_KEEP_ALIVE_SECS"), 15u64)?;
        let sse_keep_alive = (keep_alive_secs > 0).then(|| Duration::from_secs(keep_alive_secs));

        let mut relay = RelayConfig::new(
            var("RELAY_EXECUTABLE").unwrap_or_else(|| "./bin/runner".into()),
        );
        relay.working_dir = var("RELAY_WORKING_DIR").map(PathBuf::from);
        relay.exec_timeout = var("EXEC_TIMEOUT_SECS")
            .map(|v| parse_value::<u64>("EXEC_TIMEOUT_SECS", &v))
            .transpose()?
            .map(Duration::from_secs);
        relay.kill_on_disconnect = var("KILL_ON_DISCONNECT")
            .map(|v| parse_bool("KILL_ON_DISCONNECT", &v))
            .transpose()?
            .unwrap_or(false);
        relay.job_retention = Duration::from_secs(parse_or(
            "JOB_RETENTION_SECS",
            var("JOB_RETENTION_SECS"),
            DEFAULT_JOB_RETENTION.as_secs(),
        )?);
        relay.backlog_limit = parse_or(
            "JOB_BACKLOG_LIMIT",
            var("JOB_BACKLOG_LIMIT"),
            DEFAULT_BACKLOG_LIMIT,
        )?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            static_dir,
            sse_keep_alive,
            relay,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_cors_origins(raw: &str) -> Result<CorsOrigins, ConfigError> {
    let origins: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if origins.is_empty() || origins.contains(&"*") {
        return Ok(CorsOrigins::Any);
    }

    origins
        .into_iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| ConfigError {
                key: "CORS_ORIGINS",
                value: origin.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CorsOrigins::List)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = load(&[]).expect("defaults are valid");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9542);
        assert_matches!(config.cors_origins, CorsOrigins::Any);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.sse_keep_alive, Some(Duration::from_secs(15)));
        assert_eq!(config.relay.executable, PathBuf::from("./bin/runner"));
        assert!(config.relay.working_dir.is_none());
        assert!(config.relay.exec_timeout.is_none());
        assert!(!config.relay.kill_on_disconnect);
        assert_eq!(config.relay.job_retention, Duration::from_secs(300));
        assert_eq!(config.relay.backlog_limit, 10_000);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("PORT", "8080"),
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
            ("SSE_KEEP_ALIVE_SECS", "0"),
            ("RELAY_EXECUTABLE", "/opt/engine"),
            ("EXEC_TIMEOUT_SECS", "60"),
            ("KILL_ON_DISCONNECT", "yes"),
        ])
        .expect("valid overrides");

        assert_eq!(config.port, 8080);
        assert_matches!(&config.cors_origins, CorsOrigins::List(list) if list.len() == 2);
        assert!(config.sse_keep_alive.is_none());
        assert_eq!(config.relay.executable, PathBuf::from("/opt/engine"));
        assert_eq!(config.relay.exec_timeout, Some(Duration::from_secs(60)));
        assert!(config.relay.kill_on_disconnect);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("PORT", "  ")]).expect("blank is default");
        assert_eq!(config.port, 9542);
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert_eq!(err.key, "PORT");
        assert_eq!(err.value, "http");
    }

    #[test]
    fn invalid_bool_is_reported() {
        let err = load(&[("KILL_ON_DISCONNECT", "maybe")]).unwrap_err();
        assert_eq!(err.key, "KILL_ON_DISCONNECT");
    }

    #[test]
    fn wildcard_anywhere_means_any_origin() {
        let config = load(&[("CORS_ORIGINS", "http://a.test,*")]).unwrap();
        assert_matches!(config.cors_origins, CorsOrigins::Any);
    }
}

//! Server configuration module
//! Handles dynamic configuration parameters for the agent sync server

use crate::constants::{DEFAULT_CORS_ORIGIN, DEFAULT_HOST, DEFAULT_MAX_FRAME_BYTES, DEFAULT_PORT};
use crate::error::{AgentSyncError, Result};
use std::env;
use std::net::SocketAddr;
use url::Url;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,
    /// Largest inbound text frame accepted from a client
    pub max_frame_bytes: usize,
    /// Development mode (allows any CORS origin)
    pub development_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            development_mode: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host =
            lookup_any(&lookup, &["AGENT_SYNC_HOST", "HOST"]).unwrap_or(DEFAULT_HOST.to_string());

        let port = match lookup_any(&lookup, &["AGENT_SYNC_PORT", "PORT"]) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                AgentSyncError::ConfigError(format!("Invalid port number: {}", raw))
            })?,
            None => DEFAULT_PORT,
        };

        let cors_origins = lookup_any(&lookup, &["AGENT_SYNC_CORS_ORIGINS", "CORS_ORIGINS"])
            .unwrap_or(DEFAULT_CORS_ORIGIN.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();

        let max_frame_bytes = match lookup("AGENT_SYNC_MAX_FRAME_BYTES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                AgentSyncError::ConfigError(format!("Invalid frame size limit: {}", raw))
            })?,
            None => DEFAULT_MAX_FRAME_BYTES,
        };

        let development_mode = lookup("AGENT_SYNC_DEVELOPMENT_MODE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let config = Self {
            host,
            port,
            cors_origins,
            max_frame_bytes,
            development_mode,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check invariants the HTTP layer relies on
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_bytes == 0 {
            return Err(AgentSyncError::ConfigError(
                "AGENT_SYNC_MAX_FRAME_BYTES must be greater than zero".to_string(),
            ));
        }

        if self.cors_origins.is_empty() && !self.development_mode {
            return Err(AgentSyncError::ConfigError(
                "At least one CORS origin must be configured".to_string(),
            ));
        }

        for origin in &self.cors_origins {
            Self::validate_origin(origin)?;
        }

        Ok(())
    }

    /// Resolve `host:port` to a bindable address; accepts hostnames such as
    /// `localhost` as well as IP literals
    pub async fn resolve_addr(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                AgentSyncError::ConfigError(format!(
                    "Failed to resolve {}:{}: {}",
                    self.host, self.port, e
                ))
            })?;

        addrs.next().ok_or_else(|| {
            AgentSyncError::ConfigError(format!(
                "No address found for {}:{}",
                self.host, self.port
            ))
        })
    }

    /// Whether CORS should accept any origin
    pub fn allows_any_origin(&self) -> bool {
        self.development_mode || self.cors_origins.iter().any(|origin| origin == "*")
    }

    fn validate_origin(origin: &str) -> Result<()> {
        if origin == "*" {
            return Ok(());
        }

        let url = Url::parse(origin).map_err(|e| {
            AgentSyncError::ConfigError(format!("Invalid CORS origin '{}': {}", origin, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AgentSyncError::ConfigError(format!(
                "CORS origin '{}' must be an http(s) URL with a host, got scheme '{}'",
                origin,
                url.scheme()
            )));
        }

        // An origin is scheme, host and port only
        if origin.ends_with('/') || url.path() != "/" || url.query().is_some() {
            return Err(AgentSyncError::ConfigError(format!(
                "CORS origin '{}' must not contain a path or query",
                origin
            )));
        }

        Ok(())
    }
}

// First key that resolves wins
fn lookup_any<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|key| lookup(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cors_origins, vec![DEFAULT_CORS_ORIGIN.to_string()]);
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
        assert!(!config.development_mode);
    }

    #[test]
    fn test_prefixed_variables_win_over_fallbacks() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("AGENT_SYNC_PORT", "9100"),
            ("PORT", "9200"),
            ("CORS_ORIGINS", "http://a.example, https://b.example:8443"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(
            config.cors_origins,
            vec!["http://a.example".to_string(), "https://b.example:8443".to_string()]
        );
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[("PORT", "eighty")]));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid port"));
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let result =
            ServerConfig::from_lookup(lookup_from(&[("CORS_ORIGINS", "ftp://files.example")]));
        assert!(result.is_err());

        let result = ServerConfig::from_lookup(lookup_from(&[("CORS_ORIGINS", "not a url")]));
        assert!(result.is_err());

        let result =
            ServerConfig::from_lookup(lookup_from(&[("CORS_ORIGINS", "http://a.example/app")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_frame_limit_is_rejected() {
        let result =
            ServerConfig::from_lookup(lookup_from(&[("AGENT_SYNC_MAX_FRAME_BYTES", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_development_mode_allows_any_origin() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("AGENT_SYNC_DEVELOPMENT_MODE", "TRUE")]))
                .unwrap();
        assert!(config.development_mode);
        assert!(config.allows_any_origin());
        assert!(!ServerConfig::default().allows_any_origin());
    }

    #[tokio::test]
    async fn test_resolve_addr_accepts_hostnames() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HOST", "localhost"),
            ("PORT", "9300"),
        ]))
        .unwrap();

        let addr = config.resolve_addr().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9300);
    }

    #[tokio::test]
    async fn test_resolve_addr_keeps_ip_literals() {
        let config = ServerConfig::default();
        let addr = config.resolve_addr().await.unwrap();
        assert_eq!(addr, SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)));
    }
}

//! Engine and server settings.
//!
//! Both structs deserialize from JSON with every field optional, so a config file only
//! has to name what it changes. They are consumed by the builders and are not consulted
//! again once the engine or server is built.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

fn default_max_idle_contexts() -> usize {
    1024
}

fn default_max_body_size() -> usize {
    4 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on request contexts kept for reuse between requests.
    #[serde(default = "default_max_idle_contexts")]
    pub max_idle_contexts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_idle_contexts: default_max_idle_contexts() }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `127.0.0.1:8080`; a builder `bind` call takes precedence.
    #[serde(default)]
    pub address: Option<String>,

    /// Requests with a larger body are answered with 413 before dispatch.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Serve HTTPS with these PEM files; a builder `tls` call takes precedence.
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM file holding the certificate chain, leaf first.
    pub cert: PathBuf,
    /// PEM file holding the private key.
    pub key: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: None, max_body_size: default_max_body_size(), tls: None, engine: EngineConfig::default() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let config = ServerConfig::from_json("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.engine.max_idle_contexts, 1024);
    }

    #[test]
    fn fields_override_defaults() {
        let config =
            ServerConfig::from_json(r#"{"address":"0.0.0.0:3000","max_body_size":1024,"engine":{"max_idle_contexts":8}}"#)
                .unwrap();

        assert_eq!(config.address.as_deref(), Some("0.0.0.0:3000"));
        assert_eq!(config.max_body_size, 1024);
        assert_eq!(config.engine.max_idle_contexts, 8);
    }

    #[test]
    fn tls_section_is_optional() {
        let config = ServerConfig::from_json(r#"{"tls":{"cert":"certs/server.pem","key":"certs/server.key"}}"#).unwrap();
        let tls = config.tls.unwrap();
        assert_eq!(tls.cert, PathBuf::from("certs/server.pem"));
        assert_eq!(tls.key, PathBuf::from("certs/server.key"));

        assert!(ServerConfig::from_json("{}").unwrap().tls.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(ServerConfig::from_json("{\"max_body_size\":\"big\"}"), Err(ConfigError::Json { .. })));
    }
}

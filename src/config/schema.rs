//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for an application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Surface the full error chain in reply messages.
    pub debug: bool,

    /// Skip the startup banner.
    pub hide_banner: bool,

    /// Skip the "server started on" line.
    pub hide_port: bool,

    /// Listener configuration (bind address, network, TLS).
    pub listener: ListenerConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Default language and extra localized messages.
    pub i18n: I18nConfig,

    /// Error-reply pool sizing.
    pub pool: PoolConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Listener network: "tcp", "tcp4" or "tcp6".
    pub network: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Only offer HTTP/1.1 over TLS.
    pub disable_http2: bool,

    /// Maximum concurrent HTTP/2 streams per connection for h2c servers.
    pub h2c_max_concurrent_streams: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            network: "tcp".to_string(),
            tls: None,
            disable_http2: false,
            h2c_max_concurrent_streams: 250,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "uaxum=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Localization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Language tag used when a reply does not name one.
    pub default_lang: String,

    /// Extra messages keyed `"<ec>.<lang>"`, merged over the built-in ones.
    pub messages: HashMap<String, String>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_lang: crate::reply::i18n::LANG_DEFAULT.to_string(),
            messages: HashMap::new(),
        }
    }
}

/// Error-reply pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle error-reply states kept for reuse.
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: crate::reply::pool::DEFAULT_MAX_IDLE,
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time given to in-flight requests once shutdown starts, in seconds.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("debug = true").unwrap();
        assert!(config.debug);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.listener.network, "tcp");
        assert_eq!(config.i18n.default_lang, "zh-CN");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.pool.max_idle, 1024);
    }

    #[test]
    fn test_full_config_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            hide_banner = true

            [listener]
            bind_address = "127.0.0.1:9443"
            network = "tcp4"
            disable_http2 = true

            [listener.tls]
            cert_path = "cert.pem"
            key_path = "key.pem"

            [logging]
            format = "json"

            [i18n]
            default_lang = "en-US"

            [i18n.messages]
            "7001.en-US" = "Quota exceeded"
            "#,
        )
        .unwrap();

        assert!(config.hide_banner);
        assert_eq!(config.listener.network, "tcp4");
        assert!(config.listener.disable_http2);
        assert_eq!(config.listener.tls.unwrap().key_path, "key.pem");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.i18n.messages["7001.en-US"], "Quota exceeded");
    }
}

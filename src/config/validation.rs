//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the listener address and network
//! - Validate localized message keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::AppConfig;

/// Listener networks accepted by the server.
pub const SUPPORTED_NETWORKS: [&str; 3] = ["tcp", "tcp4", "tcp6"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not of the form [host]:port")]
    BindAddress(String),

    #[error("listener.network `{0}` is not one of tcp, tcp4, tcp6")]
    Network(String),

    #[error("listener.tls paths must not be empty")]
    TlsPath,

    #[error("i18n.default_lang must not be empty")]
    DefaultLang,

    #[error("i18n.messages key `{0}` is not of the form <code>.<lang>")]
    MessageKey(String),

    #[error("listener.h2c_max_concurrent_streams must be greater than zero")]
    H2cStreams,
}

/// Check a configuration, collecting every problem.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_bind_address(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if !SUPPORTED_NETWORKS.contains(&config.listener.network.as_str()) {
        errors.push(ValidationError::Network(config.listener.network.clone()));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::TlsPath);
        }
    }

    if config.listener.h2c_max_concurrent_streams == 0 {
        errors.push(ValidationError::H2cStreams);
    }

    if config.i18n.default_lang.trim().is_empty() {
        errors.push(ValidationError::DefaultLang);
    }

    let mut bad_keys: Vec<&String> = config
        .i18n
        .messages
        .keys()
        .filter(|key| !is_message_key(key))
        .collect();
    bad_keys.sort();
    errors.extend(bad_keys.into_iter().map(|k| ValidationError::MessageKey(k.clone())));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `:port` or `host:port` with a numeric port. The host is resolved at bind
/// time, so names are accepted here.
fn is_bind_address(address: &str) -> bool {
    let (host, port) = match address.strip_prefix(':') {
        Some(port) => ("*", port),
        None => match address.rsplit_once(':') {
            Some(split) => split,
            None => return false,
        },
    };
    let bracketed = host.starts_with('[') == host.ends_with(']');
    !host.is_empty() && bracketed && port.parse::<u16>().is_ok()
}

fn is_message_key(key: &str) -> bool {
    match key.split_once('.') {
        Some((code, lang)) => code.parse::<i64>().is_ok() && !lang.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "localhost".into();
        config.listener.network = "udp".into();
        config.listener.tls = Some(TlsConfig {
            cert_path: "".into(),
            key_path: "key.pem".into(),
        });
        config.i18n.default_lang = " ".into();
        config.i18n.messages.insert("oops".into(), "x".into());
        config.i18n.messages.insert("200.en-US".into(), "fine".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("localhost".into()),
                ValidationError::Network("udp".into()),
                ValidationError::TlsPath,
                ValidationError::DefaultLang,
                ValidationError::MessageKey("oops".into()),
            ]
        );
    }

    #[test]
    fn test_bind_address_shape() {
        assert!(is_bind_address(":12345"));
        assert!(is_bind_address("localhost:8080"));
        assert!(is_bind_address("127.0.0.1:0"));
        assert!(is_bind_address("[::1]:8080"));
        assert!(!is_bind_address("localhost"));
        assert!(!is_bind_address("localhost:http"));
        assert!(!is_bind_address(":99999"));
        assert!(!is_bind_address("[::1:8080"));
    }

    #[test]
    fn test_port_only_address_is_valid() {
        let mut config = AppConfig::default();
        config.listener.bind_address = ":12345".into();
        assert_eq!(validate_config(&config), Ok(()));

        config.listener.bind_address = "localhost:8080".into();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_message_key_shape() {
        assert!(is_message_key("10302.zh-TW"));
        assert!(!is_message_key("abc.en-US"));
        assert!(!is_message_key("200."));
        assert!(!is_message_key("200"));
    }
}

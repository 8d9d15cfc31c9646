//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the message catalog and default language from configuration
//! - Print the banner and the listen address
//!
//! # Design Decisions
//! - Process-wide state (catalog, default language) is set once; later
//!   attempts are logged and ignored

use std::net::SocketAddr;

use crate::config::{AppConfig, I18nConfig};
use crate::reply::i18n::{self, Catalog};

const BANNER: &str = r"

  __ ______ __ ____ ____ ____
 / // / _ `/\ \ / // /  '  \
 \_,_/\_,_//_\_\\_,_/_/_/_/
";

/// Install the localization settings from `config`.
pub fn apply_i18n(config: &I18nConfig) {
    if !i18n::set_default_lang(config.default_lang.clone()) && i18n::default_lang() != config.default_lang {
        tracing::warn!(
            current = i18n::default_lang(),
            requested = %config.default_lang,
            "Default language already set"
        );
    }

    let catalog = catalog_from(config);
    let entries = catalog.len();
    if i18n::install(catalog) {
        tracing::debug!(entries, "Message catalog installed");
    } else if !config.messages.is_empty() {
        tracing::warn!("Message catalog already installed, configured messages ignored");
    }
}

/// Built-in catalog with the configured messages merged over it.
pub fn catalog_from(config: &I18nConfig) -> Catalog {
    let mut catalog = Catalog::builtin();
    catalog.extend(config.messages.clone());
    catalog
}

/// Banner and listen address, unless hidden by configuration.
pub fn announce(config: &AppConfig, scheme: &str, addr: SocketAddr) {
    if !config.hide_banner {
        println!("{}v{}", BANNER, env!("CARGO_PKG_VERSION"));
    }
    if !config.hide_port {
        tracing::info!(address = %addr, "⇨ {} server started on {}", scheme, addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_from_merges_messages() {
        let mut config = I18nConfig::default();
        config.messages.insert("7001.en-US".into(), "Quota exceeded".into());
        config.messages.insert("200.en-US".into(), "All good".into());

        let catalog = catalog_from(&config);
        assert_eq!(catalog.get(7001, "en-US"), Some("Quota exceeded"));
        assert_eq!(catalog.get(200, "en-US"), Some("All good"));
        assert_eq!(catalog.get(200, "zh-CN"), Some("请求成功"));
    }
}

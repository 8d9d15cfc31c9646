//! Localized messages for business codes.
//!
//! # Responsibilities
//! - Hold the `"<ec>.<lang>"` → message catalog
//! - Resolve the process default language
//! - Report lookup misses without failing the caller
//!
//! # Design Decisions
//! - Catalog is installed once (first install wins) and read-only afterwards
//! - Without an explicit install the built-in catalog is used
//! - A miss is a warning, never an error

use std::collections::HashMap;
use std::sync::OnceLock;

pub const LANG_ZH_CN: &str = "zh-CN";
pub const LANG_ZH_TW: &str = "zh-TW";
pub const LANG_EN_US: &str = "en-US";

/// Language used when neither the reply nor the configuration names one.
pub const LANG_DEFAULT: &str = LANG_ZH_CN;

static DEFAULT_LANG: OnceLock<String> = OnceLock::new();
static CATALOG: OnceLock<Catalog> = OnceLock::new();

/// Message catalog keyed by business code and language tag.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages shipped with the crate.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        let entries: &[(i64, [&str; 3])] = &[
            (200, ["请求成功", "请求成功", "Success"]),
            (400, ["请求失败", "请求失败", "Fail"]),
            (401, ["非法的请求API协议", "非法的请求API协议", "Invalid Protocol"]),
            (
                403,
                [
                    "权限验证失败，请重新登录",
                    "权限验证失败，请重新登录",
                    "Permission Denied,Please Login! ",
                ],
            ),
            (404, ["流量控制", "流量控制", "Flow Controlled"]),
            (405, ["暂不支持的服务", "暂不支持的服务", "Service Not Found"]),
            (410, ["状态已经失效", "状态已经失效", "Session has been expired !"]),
            (
                500,
                [
                    "服务器内部错误,请稍后再试",
                    "服务器内部错误,请稍后再试",
                    "Server Internal Error !",
                ],
            ),
            (501, ["参数错误", "参数错误", "Parameters are invalid  !"]),
            (
                502,
                [
                    "读取微信服务器数据失败，请稍后再试",
                    "参数错误",
                    "Fecthing informations from wechat's endpoint has been fail, Please try later!",
                ],
            ),
            (
                10302,
                [
                    "加密方式已变更!",
                    "Encrypt Method has been changed!",
                    "Encrypt Method has been changed!",
                ],
            ),
        ];

        for (ec, [zh_cn, zh_tw, en_us]) in entries {
            catalog.insert(*ec, LANG_ZH_CN, *zh_cn);
            catalog.insert(*ec, LANG_ZH_TW, *zh_tw);
            catalog.insert(*ec, LANG_EN_US, *en_us);
        }
        catalog
    }

    /// Insert or replace the message for `ec` in `lang`.
    pub fn insert(&mut self, ec: i64, lang: &str, message: impl Into<String>) {
        self.messages.insert(key(ec, lang), message.into());
    }

    /// Merge pre-keyed entries (`"<ec>.<lang>"`), later entries win.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.messages
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    pub fn get(&self, ec: i64, lang: &str) -> Option<&str> {
        self.messages.get(&key(ec, lang)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn key(ec: i64, lang: &str) -> String {
    format!("{}.{}", ec, lang)
}

/// Install the process-wide catalog.
///
/// Returns `false` if a catalog was already installed (or the built-in one
/// was already used by a lookup); the existing catalog is kept.
pub fn install(catalog: Catalog) -> bool {
    CATALOG.set(catalog).is_ok()
}

/// The process-wide catalog, falling back to [`Catalog::builtin`].
pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(Catalog::builtin)
}

/// Set the default language. Only the first call wins.
pub fn set_default_lang(lang: impl Into<String>) -> bool {
    DEFAULT_LANG.set(lang.into()).is_ok()
}

pub fn default_lang() -> &'static str {
    DEFAULT_LANG.get().map(String::as_str).unwrap_or(LANG_DEFAULT)
}

/// Look up the message for `ec` in `lang`, logging a warning on a miss.
pub fn lookup(ec: i64, lang: &str) -> Option<&'static str> {
    let found = catalog().get(ec, lang);
    if found.is_none() {
        tracing::warn!(ec, lang, "I18n: invalid code/lang [{}.{}]", ec, lang);
    }
    found
}

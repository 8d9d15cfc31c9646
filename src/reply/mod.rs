//! Response envelope subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → canonical Reply (OK, ERR_INTERNAL, ...) or Reply::new
//!     → with_* (copy-on-write customisation)
//!     → Context::set_payload   (http_code < 400: JSON envelope)
//!     → Context::abort         (ErrReply from pool.rs)
//!         → with_err / with_field (err_reply.rs)
//!         → IntoResponse + ErrorReport extension
//!     → error boundary, logger
//! ```
//!
//! # Design Decisions
//! - `Reply` is a value: every `with_*` returns a new one, so the
//!   canonical replies are plain `const` items shared by every request
//! - `ErrReply` is the only mutable piece and is recycled through a pool
//! - Messages can be localized through `i18n.rs`; lookups never fail

pub mod err_reply;
pub mod i18n;
pub mod pool;

use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub use err_reply::{Causes, ErrReply, ErrorReport};
pub use pool::ErrReplyPool;

/// JSON body written for every reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpApiResponse {
    pub ec: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub em: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Outcome of a request: transport status, business code, message, payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    http_code: u16,
    ec: i64,
    em: Cow<'static, str>,
    lang: Option<Cow<'static, str>>,
    data: Option<serde_json::Value>,
}

/// Success.
pub const OK: Reply = Reply::from_static(200, 200, "");

/// The request could not be understood (bad parameters).
pub const ERR_ILLEGAL_PARAMS: Reply = Reply::from_static(400, 400, "Bad Request");

pub const ERR_UNAUTHORIZED: Reply = Reply::from_static(401, 401, "Unauthorized");

pub const ERR_NOT_FOUND: Reply = Reply::from_static(404, 404, "Not Found");

pub const ERR_METHOD_NOT_ALLOWED: Reply = Reply::from_static(405, 405, "Method Not Allowed");

/// Internal server error.
pub const ERR_INTERNAL: Reply = Reply::from_static(500, 500, "Internal Server Error");

impl Reply {
    pub fn new(http_code: u16, ec: i64, em: impl Into<Cow<'static, str>>) -> Self {
        Self {
            http_code,
            ec,
            em: em.into(),
            lang: None,
            data: None,
        }
    }

    /// Build a reply in a `const` context.
    pub const fn from_static(http_code: u16, ec: i64, em: &'static str) -> Self {
        Self {
            http_code,
            ec,
            em: Cow::Borrowed(em),
            lang: None,
            data: None,
        }
    }

    pub fn with_http_code(&self, http_code: u16) -> Self {
        Self {
            http_code,
            ..self.clone()
        }
    }

    pub fn http_code(&self) -> u16 {
        self.http_code
    }

    /// Copy with a different business code.
    pub fn with_ec(&self, ec: i64) -> Self {
        Self { ec, ..self.clone() }
    }

    pub fn ec(&self) -> i64 {
        self.ec
    }

    pub fn with_em(&self, em: impl Into<Cow<'static, str>>) -> Self {
        Self {
            em: em.into(),
            ..self.clone()
        }
    }

    pub fn em(&self) -> &str {
        &self.em
    }

    pub fn with_lang(&self, lang: impl Into<Cow<'static, str>>) -> Self {
        Self {
            lang: Some(lang.into()),
            ..self.clone()
        }
    }

    /// Language tag of this reply, the process default when unset.
    pub fn lang(&self) -> &str {
        self.lang.as_deref().unwrap_or_else(|| i18n::default_lang())
    }

    /// Copy carrying `data` as payload.
    ///
    /// An empty payload (`None`, `()`) is omitted from the envelope. A payload
    /// that cannot be represented as JSON is logged and omitted too.
    pub fn with_data<T: Serialize>(&self, data: T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(ec = self.ec, error = %e, "Reply payload is not serializable");
                serde_json::Value::Null
            }
        };
        Self {
            data: (!data.is_null()).then_some(data),
            ..self.clone()
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    /// Localized message for this reply's business code in `lang`.
    ///
    /// Returns an empty string (and logs a warning) when the catalog has no
    /// entry. The receiver is not modified; see [`Reply::localized`].
    pub fn i18n(&self, lang: &str) -> String {
        i18n::lookup(self.ec, lang)
            .map(str::to_owned)
            .unwrap_or_default()
    }

    /// Copy whose language is `lang` and whose message is the localized one.
    ///
    /// The message is kept when the catalog has no entry.
    pub fn localized(&self, lang: &str) -> Self {
        let em = match i18n::lookup(self.ec, lang) {
            Some(message) => Cow::Borrowed(message),
            None => self.em.clone(),
        };
        Self {
            em,
            lang: Some(Cow::Owned(lang.to_owned())),
            ..self.clone()
        }
    }

    /// Response body for this reply.
    pub fn to_body(&self) -> HttpApiResponse {
        HttpApiResponse {
            ec: self.ec,
            em: self.em.to_string(),
            data: self.data.clone(),
        }
    }

    /// Transport status, falling back to 500 for codes outside 100..=999.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.http_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn is_error(&self) -> bool {
        self.http_code >= 400
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        if self.is_error() {
            return ErrReplyPool::global().acquire(self).into_response();
        }
        (self.status(), Json(self.to_body())).into_response()
    }
}

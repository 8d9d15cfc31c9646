//! Error replies: a pooled decorator over [`Reply`] for the abnormal path.
//!
//! # Responsibilities
//! - Accumulate causes without losing earlier ones
//! - Carry diagnostic fields for the access log
//! - Render the error chain and the response envelope
//!
//! # Design Decisions
//! - Builder methods consume and return `self`, mutating in place
//! - The scratch state goes back to the pool on drop, reset first
//! - The response carries an `ErrorReport` extension so middleware can log
//!   and re-render without holding the pooled value

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::reply::pool::ErrReplyPool;
use crate::reply::Reply;

/// Boxed error accepted as a cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Placeholder observed only between release and the next acquire.
static BLANK: Reply = Reply::from_static(0, 0, "");

/// Every cause recorded on an [`ErrReply`], in insertion order.
#[derive(Default)]
pub struct Causes(Vec<BoxError>);

impl Causes {
    pub fn push(&mut self, err: BoxError) {
        self.0.push(err);
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn std::error::Error + Send + Sync + 'static)> {
        self.0.iter().map(|e| &**e)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Debug for Causes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|e| e.to_string())).finish()
    }
}

impl fmt::Display for Causes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Recyclable state behind an [`ErrReply`].
#[derive(Debug, Default)]
pub(crate) struct ErrState {
    reply: Option<Reply>,
    causes: Causes,
    fields: HashMap<String, serde_json::Value>,
}

impl ErrState {
    /// Back to blank. Keeps allocated capacity.
    pub(crate) fn reset(&mut self) {
        self.reply = None;
        self.causes.clear();
        self.fields.clear();
    }

    pub(crate) fn install(&mut self, reply: Reply) {
        self.reply = Some(reply);
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.reply.is_none() && self.causes.is_empty() && self.fields.is_empty()
    }
}

/// Error response for a single request.
///
/// Obtained from [`ErrReplyPool::acquire`] (usually via
/// `Context::abort`). Dropping it returns its state to the pool.
pub struct ErrReply {
    state: ErrState,
    pool: Arc<ErrReplyPool>,
}

impl ErrReply {
    pub(crate) fn new(state: ErrState, pool: Arc<ErrReplyPool>) -> Self {
        Self { state, pool }
    }

    /// Add one diagnostic field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.state.fields.insert(key.into(), value.into());
        self
    }

    /// Merge diagnostic fields; later values win on key collision.
    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.state
            .fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Record another cause. Earlier causes are kept.
    pub fn with_err(mut self, err: impl Into<BoxError>) -> Self {
        self.state.causes.push(err.into());
        self
    }

    pub fn reply(&self) -> &Reply {
        self.state.reply.as_ref().unwrap_or(&BLANK)
    }

    pub fn http_code(&self) -> u16 {
        self.reply().http_code()
    }

    pub fn ec(&self) -> i64 {
        self.reply().ec()
    }

    pub fn em(&self) -> &str {
        self.reply().em()
    }

    pub fn causes(&self) -> &Causes {
        &self.state.causes
    }

    pub fn fields(&self) -> &HashMap<String, serde_json::Value> {
        &self.state.fields
    }

    /// Snapshot used by middleware once the reply itself is gone.
    pub fn report(&self) -> ErrorReport {
        let mut fields: Vec<(String, serde_json::Value)> = self
            .state
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        ErrorReport {
            http_code: self.http_code(),
            ec: self.ec(),
            em: self.em().to_string(),
            detail: self.to_string(),
            fields,
        }
    }
}

impl fmt::Display for ErrReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.state.causes.is_empty() {
            write!(f, "code: {}, {}", self.ec(), self.em())
        } else {
            write!(f, "{}: {}", self.em(), self.state.causes)
        }
    }
}

impl fmt::Debug for ErrReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrReply")
            .field("reply", self.reply())
            .field("causes", &self.state.causes)
            .field("fields", &self.state.fields)
            .finish()
    }
}

impl std::error::Error for ErrReply {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.state
            .causes
            .0
            .first()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl Drop for ErrReply {
    fn drop(&mut self) {
        let mut state = std::mem::take(&mut self.state);
        state.reset();
        self.pool.release(state);
    }
}

impl IntoResponse for ErrReply {
    fn into_response(self) -> Response {
        let report = self.report();
        let body = crate::reply::HttpApiResponse {
            ec: report.ec,
            em: report.em.clone(),
            data: None,
        };
        let mut response = (self.reply().status(), Json(body)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// What the boundary knows about an error reply after it was rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub http_code: u16,
    pub ec: i64,
    /// Canonical message, safe to show to clients.
    pub em: String,
    /// Full error chain, only shown in debug mode.
    pub detail: String,
    /// Diagnostic fields sorted by key.
    pub fields: Vec<(String, serde_json::Value)>,
}

impl ErrorReport {
    /// Report for an error that did not originate from an [`ErrReply`].
    pub fn from_status(http_code: u16, em: impl Into<String>) -> Self {
        let em = em.into();
        Self {
            http_code,
            ec: i64::from(http_code),
            detail: format!("code: {}, {}", http_code, em),
            em,
            fields: Vec::new(),
        }
    }

    /// Fields rendered as `key=value` pairs.
    pub fn fields_display(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

//! uaxum: reply envelopes, pooled error replies and a batteries-included
//! server front end for axum.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod reply;
pub mod routing;

pub use config::AppConfig;
pub use error::{Result, ServerError};
pub use http::{Context, H2cOptions, Handle, HandlerResult, HttpServer};
pub use lifecycle::Shutdown;
pub use reply::{
    ErrReply, ErrReplyPool, HttpApiResponse, Reply, ERR_ILLEGAL_PARAMS, ERR_INTERNAL,
    ERR_METHOD_NOT_ALLOWED, ERR_NOT_FOUND, ERR_UNAUTHORIZED, OK,
};
pub use routing::{Group, RouteInfo};

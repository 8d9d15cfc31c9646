//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum/hyper setup, protocol selection)
//!     → pre middleware (e.g. middleware::logger)
//!     → error_handler.rs (envelope for every error response)
//!     → routing (host, path, method)
//!     → layer middleware
//!     → handler (context.rs, handler.rs)
//!     → Reply / ErrReply rendered as the JSON envelope
//! ```

pub mod context;
pub mod error_handler;
pub mod handler;
pub mod middleware;
pub mod server;

pub use context::Context;
pub use error_handler::handle_errors;
pub use handler::{method_not_allowed_handler, not_found_handler, Handle, HandlerResult};
pub use server::{H2cOptions, HttpServer};

//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! bind address + network
//!     → listener.rs (resolve, socket options, bind)
//!     → tls.rs (optional certificate loading, ALPN)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Only stream networks (tcp, tcp4, tcp6) are accepted
//! - Keep-alive is set on the listening socket and inherited by connections
//! - Certificates may come from files or from memory

pub mod listener;
pub mod tls;

pub use listener::{bind_listener, Network};
pub use tls::{load_tls_config, CertSource};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields)
//!     → http::middleware::logger (one access event per request)
//!
//! logging.rs installs the subscriber:
//!     → EnvFilter (RUST_LOG or configured directive)
//!     → fmt layer (pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Access events use their own target so they can be filtered separately

pub mod logging;

pub use logging::init_logging;

//! Middleware shipped with the crate.
//!
//! Any tower layer can be installed on a server or group; the ones here
//! know about error reports.

pub mod logger;

pub use logger::{level_for_status, logger, logger_with_config, LoggerConfig, LoggerLayer};

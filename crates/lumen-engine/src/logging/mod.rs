//! Logging setup.
//!
//! Components log through the `log` facade; the binary installs `env_logger`
//! once at startup.

mod init;

pub use init::{DEFAULT_FILTER, LogStyle, LoggingConfig, init_logging};

use std::sync::Once;

use serde::{Deserialize, Serialize};

/// Default filter when neither the config nor `RUST_LOG` provide one.
///
/// wgpu and naga are chatty at `info`; keep them to warnings.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `filter` follows the `env_logger` filter syntax (e.g. "info",
/// "lumen_engine=debug,wgpu_core=warn").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub style: LogStyle,
}

/// ANSI coloring behavior.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStyle {
    #[default]
    Auto,
    Always,
    Never,
}

impl From<LogStyle> for env_logger::WriteStyle {
    fn from(style: LogStyle) -> Self {
        match style {
            LogStyle::Auto => env_logger::WriteStyle::Auto,
            LogStyle::Always => env_logger::WriteStyle::Always,
            LogStyle::Never => env_logger::WriteStyle::Never,
        }
    }
}

impl LoggingConfig {
    /// Filter string in effect: explicit filter, then `RUST_LOG`, then the default.
    pub fn effective_filter(&self) -> String {
        self.filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Subsequent calls are ignored. Intended usage is early in `main`.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = config.effective_filter();

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&filter);
        builder.write_style(config.style.into());

        // Another logger may already be installed (tests, embedding hosts).
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized with filter `{filter}`");
    });
}

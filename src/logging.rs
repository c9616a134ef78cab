//! `env_logger` wiring for hosts that want to see the engine's `log` output.

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;
use std::sync::Once;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// filter directives such as "warn" or "stealthpaint::session=trace".
    /// unset falls back to `RUST_LOG`, then info.
    pub filter: Option<String>,
    pub write_style: WriteStyle,
    /// millisecond timestamps instead of whole seconds
    pub millis: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            write_style: WriteStyle::Auto,
            millis: true,
        }
    }
}

fn builder(config: &LoggingConfig) -> Builder {
    let mut b = Builder::new();
    match config.filter.clone().or_else(|| std::env::var("RUST_LOG").ok()) {
        Some(directives) => b.parse_filters(&directives),
        None => b.filter_level(LevelFilter::Info),
    };
    if config.millis {
        b.format_timestamp_millis();
    }
    b.write_style(config.write_style);
    b
}

static ONCE: Once = Once::new();

/// Install the global logger. Only the first call in a process does anything.
pub fn init_logging(config: LoggingConfig) {
    ONCE.call_once(|| match builder(&config).try_init() {
        Ok(()) => log::debug!("logger installed"),
        // test harnesses may have set one already
        Err(e) => log::trace!("logger not installed: {e}"),
    });
}

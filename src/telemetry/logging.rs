//! Logging configuration and initialization
//!
//! Console logging through `env_logger`, behind the `log` facade used by
//! every module.

/// Environment variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "NEGLECT_LOG";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when neither `NEGLECT_LOG` nor `RUST_LOG` is set
    pub default_level: String,
    /// Prefix lines with a timestamp (default: true)
    pub timestamps: bool,
    /// Include the module path (default: true)
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            timestamps: true,
            module_path: true,
        }
    }
}

impl LogConfig {
    /// Filter string in effect: `NEGLECT_LOG`, then `RUST_LOG`, then the default
    pub fn effective_filter(&self) -> String {
        std::env::var(LOG_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| self.default_level.clone())
    }
}

/// Initialize the global logger
///
/// Fails if a logger is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), log::SetLoggerError> {
    let filter = config.effective_filter();
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filter);

    if config.timestamps {
        builder.format_timestamp_millis();
    } else {
        builder.format_timestamp(None);
    }
    builder.format_module_path(config.module_path);

    builder.try_init()?;

    log::info!(
        target: "neglect_lens",
        "Logging initialized (filter: {}, version {})",
        filter,
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

/// Logger for tests: captured output, errors ignored when already set
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use std::io::Write;

    let _ = env_logger::Builder::new()
        .parse_filters("debug")
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .is_test(true)
        .try_init();
}

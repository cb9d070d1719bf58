//! Global `tracing` subscriber setup.
//!
//! Components log with structured fields (`conn_id = %id`, `recipients`, ...)
//! through the `tracing` macros; this module only decides where that output
//! goes. `RUST_LOG` wins over the configured level when set.

use tracing_subscriber::EnvFilter;

/// Output format for the stderr log stream.
///
/// With the `clap` feature this is a `ValueEnum`, so binaries can take it
/// straight from a flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogFormat {
    /// Human-readable single-line records.
    #[default]
    #[cfg_attr(feature = "clap", value(alias = "text"))]
    Compact,
    /// One JSON object per record, for log shippers.
    Json,
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// Call once at startup. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Default filter directive, e.g. `"info"` or `"matchcast_server=debug"`.
/// * `format` - Compact text or JSON lines.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // try_init fails only when a subscriber is already installed
    let _ = match format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        init_subscriber("warn", LogFormat::Compact);
        init_subscriber("debug", LogFormat::Json);
    }

    #[cfg(feature = "clap")]
    #[test]
    fn value_enum_accepts_text_alias() {
        use clap::ValueEnum;
        assert_eq!(LogFormat::from_str("json", false), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("text", false), Ok(LogFormat::Compact));
        assert_eq!(LogFormat::from_str("JSON", true), Ok(LogFormat::Json));
        assert!(LogFormat::from_str("xml", false).is_err());
    }
}

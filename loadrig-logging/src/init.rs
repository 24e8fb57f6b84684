use anyhow::Result;
use loadrig_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Filter from the configured level, falling back to `RUST_LOG`, then `info`
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config.level.as_str());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    if tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(log_level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadrig_config::LogLevel;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Json,
            include_location: true,
        };
        assert!(init_logging_from_config(&config).is_ok());
        assert!(init_logging_from_config(&LoggingConfig::default()).is_ok());
        assert!(init_simple_tracing("warn").is_ok());
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // An unparseable directive must not panic
        let _filter = build_env_filter("not a [valid directive");
    }
}

use tracing_subscriber::EnvFilter;

use super::config::LoggingConfig;

/// Фильтр событий: `RUST_LOG`, если задан, иначе директива из конфигурации.
///
/// Некорректная директива не роняет запуск: используется `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;
    use tracing::{debug, info};
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;
    use crate::logging::{formatter::tests::VecMakeWriter, LogFormat};

    fn capture(
        config: &LoggingConfig,
        emit: impl FnOnce(),
    ) -> String {
        let writer = VecMakeWriter::default();
        let layer = crate::logging::formatter::build_layer::<Registry, _>(
            config,
            LogFormat::Compact,
            false,
            writer.clone(),
        );
        let subscriber = Registry::default()
            .with(layer)
            .with(build_filter_from_config(config));
        tracing::subscriber::with_default(subscriber, emit);
        writer.contents()
    }

    /// Тест проверяет, что уровень из конфигурации отсекает debug.
    #[test]
    #[serial]
    fn test_config_level_applies_without_env() {
        env::remove_var("RUST_LOG");
        let out = capture(&LoggingConfig::default(), || {
            debug!("hidden");
            info!("shown");
        });
        assert!(out.contains("shown"));
        assert!(!out.contains("hidden"));
    }

    /// Тест проверяет приоритет RUST_LOG над конфигурацией.
    #[test]
    #[serial]
    fn test_env_overrides_config() {
        env::set_var("RUST_LOG", "debug");
        let out = capture(&LoggingConfig::default(), || debug!("visible"));
        env::remove_var("RUST_LOG");
        assert!(out.contains("visible"));
    }

    #[test]
    #[serial]
    fn test_invalid_directive_falls_back() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "=[bad".to_string(),
            ..Default::default()
        };
        let out = capture(&cfg, || info!("still logs"));
        assert!(out.contains("still logs"));
    }
}

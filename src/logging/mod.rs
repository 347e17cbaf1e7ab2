pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

use std::error::Error;

pub use config::{LogFormat, LoggingConfig};
pub use filters::build_filter_from_config;
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, registry::Registry, util::SubscriberInitExt};

/// Устанавливает глобальный подписчик tracing по конфигурации.
///
/// Повторный вызов в том же процессе возвращает ошибку.
pub fn init_logging(
    config: &LoggingConfig
) -> Result<LoggingHandle, Box<dyn Error + Send + Sync>> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(config);
    let mut layers: Vec<formatter::BoxedLayer<Registry>> = Vec::new();

    if config.console_enabled {
        layers.push(sinks::console::layer(config));
    }

    let file_guard = if config.file_enabled {
        let (file_layer, guard) = sinks::file::layer(config)?;
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = ?config.format,
        console_enabled = config.console_enabled,
        file_enabled = config.file_enabled,
        log_dir = %config.log_dir.display(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}

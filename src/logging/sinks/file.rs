use std::io;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::registry::LookupSpan;

use crate::logging::{
    config::LoggingConfig,
    formatter::{self, BoxedLayer},
};

/// Файловый слой с ежедневной ротацией.
///
/// Запись идёт через фоновый поток; guard нужно держать до завершения
/// процесса, иначе хвост буфера потеряется.
pub fn layer<S>(config: &LoggingConfig) -> io::Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    config.ensure_log_dir()?;
    let appender = rolling::daily(&config.log_dir, &config.file_name);
    let (writer, guard) = non_blocking(appender);

    let layer = formatter::build_layer(config, config.file_format, false, writer);
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что после сброса guard событие оказывается в файле.
    #[test]
    fn test_file_layer_writes_to_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            file_enabled: true,
            log_dir: tmp.path().to_path_buf(),
            file_name: "test.log".to_string(),
            ..Default::default()
        };

        let (layer, guard) = layer::<Registry>(&cfg).unwrap();
        tracing::subscriber::with_default(Registry::default().with(layer), || {
            info!("written to file");
        });
        drop(guard);

        let contents: String = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("test.log"))
            .map(|e| fs::read_to_string(e.path()).unwrap())
            .collect();
        assert!(contents.contains("written to file"));
    }
}

use std::io;

use tracing_subscriber::registry::LookupSpan;

use crate::logging::{
    config::LoggingConfig,
    formatter::{self, BoxedLayer},
};

/// Консольный слой в формате `config.format`.
pub fn layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    formatter::build_layer(
        config,
        config.format,
        config.effective_ansi(),
        io::stdout as fn() -> io::Stdout,
    )
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;
    use crate::logging::LogFormat;

    /// Тест проверяет, что слой строится для всех форматов и логирование
    /// не паникует.
    #[test]
    fn test_layer_for_each_format() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            let cfg = LoggingConfig {
                format,
                ansi: false,
                ..Default::default()
            };
            let subscriber = Registry::default().with(layer::<Registry>(&cfg));
            tracing::subscriber::with_default(subscriber, || info!("console smoke"));
        }
    }
}
